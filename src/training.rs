pub mod data;
pub mod factory;
pub mod failure;
pub mod logbook;
pub mod prompt;
pub mod session;
pub mod trainer;

#[cfg(test)]
pub(crate) mod fakes;
