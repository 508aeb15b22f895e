//! Domain types: feature records and queued edits

pub mod edit;
pub mod feature;

pub use edit::{edit_key, EditBatch, EditEntry, EditOperation};
pub use feature::{FeatureRecord, DEFAULT_OBJECT_ID_FIELD};
