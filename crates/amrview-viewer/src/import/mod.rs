pub mod decoder;
pub mod store;

pub use decoder::{decode, ImportedDocument};
pub use store::ImportStore;
