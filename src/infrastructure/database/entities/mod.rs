//! Database entities

pub mod edit_entry;
