pub mod catalog;
pub mod config;
pub mod environment;
pub mod model;
pub mod training;
