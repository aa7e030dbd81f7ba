pub mod embedding;
pub mod library;
pub mod song;

pub use library::{CatalogError, Library};
pub use song::Song;
