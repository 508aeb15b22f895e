//! Services: submission gate, replay engine, connectivity, id allocation

pub mod connectivity;
pub mod replay;
pub mod submission;
pub mod temp_ids;
