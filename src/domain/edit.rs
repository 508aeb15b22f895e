//! Edit entries: one queued pending operation against one record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feature::FeatureRecord;

/// Kind of pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOperation {
	Create,
	Update,
	Delete,
}

impl EditOperation {
	pub fn as_str(&self) -> &'static str {
		match self {
			EditOperation::Create => "create",
			EditOperation::Update => "update",
			EditOperation::Delete => "delete",
		}
	}
}

impl std::fmt::Display for EditOperation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Compose the store key for an endpoint/record pair
pub fn edit_key(endpoint_id: &str, record_id: i64) -> String {
	format!("{endpoint_id}/{record_id}")
}

/// One queued pending operation against one record.
///
/// At most one entry exists per key at any time; a later submission against
/// the same record collapses into the existing entry instead of appending.
/// The payload is the full snapshot of the record at queue time (the state
/// to push, not a diff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEntry {
	pub key: String,
	pub operation: EditOperation,
	pub endpoint_id: String,
	pub record_id: i64,
	pub payload: FeatureRecord,
	pub queued_at: DateTime<Utc>,
}

impl EditEntry {
	pub fn new(
		operation: EditOperation,
		endpoint_id: &str,
		record_id: i64,
		payload: FeatureRecord,
	) -> Self {
		Self {
			key: edit_key(endpoint_id, record_id),
			operation,
			endpoint_id: endpoint_id.to_string(),
			record_id,
			payload,
			queued_at: Utc::now(),
		}
	}
}

/// A batch of records submitted together against one endpoint
#[derive(Debug, Clone, Default)]
pub struct EditBatch {
	pub adds: Vec<FeatureRecord>,
	pub updates: Vec<FeatureRecord>,
	pub deletes: Vec<FeatureRecord>,
}

impl EditBatch {
	pub fn is_empty(&self) -> bool {
		self.adds.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
	}

	pub fn len(&self) -> usize {
		self.adds.len() + self.updates.len() + self.deletes.len()
	}

	/// Iterate records paired with their operation, adds first, then
	/// updates, then deletes
	pub fn iter_ops(&self) -> impl Iterator<Item = (EditOperation, &FeatureRecord)> {
		self.adds
			.iter()
			.map(|r| (EditOperation::Create, r))
			.chain(self.updates.iter().map(|r| (EditOperation::Update, r)))
			.chain(self.deletes.iter().map(|r| (EditOperation::Delete, r)))
	}
}
