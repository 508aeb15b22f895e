//! Remote endpoint seam
//!
//! The engine never talks to a concrete service binding. Adapters implement
//! `EditableEndpoint` for one remote collection/table plus the live
//! in-memory view the application holds for it; everything above depends on
//! this trait only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::FeatureRecord;

/// Failure of a remote call.
///
/// Network-level failures are opaque: they fail the whole call, never
/// individual records.
#[derive(Debug, Error)]
pub enum EndpointError {
	#[error("endpoint unavailable: {0}")]
	Unavailable(String),

	#[error("protocol error: {0}")]
	Protocol(String),
}

/// Per-record result of an applied change, positionally aligned with the
/// request bucket it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResult {
	pub success: bool,
	/// Identifier confirmed by the server (for creates, the newly assigned id)
	pub id: Option<i64>,
	pub error: Option<String>,
}

impl EditResult {
	pub fn ok(id: i64) -> Self {
		Self {
			success: true,
			id: Some(id),
			error: None,
		}
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self {
			success: false,
			id: None,
			error: Some(message.into()),
		}
	}
}

/// Combined change set applied to one endpoint in a single remote call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
	pub creates: Vec<FeatureRecord>,
	pub updates: Vec<FeatureRecord>,
	pub deletes: Vec<FeatureRecord>,
}

impl ChangeSet {
	pub fn is_empty(&self) -> bool {
		self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
	}
}

/// Server response to an applied change set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResponse {
	pub create_results: Vec<EditResult>,
	pub update_results: Vec<EditResult>,
	pub delete_results: Vec<EditResult>,
}

/// One remote collection/table of records plus its live in-memory view.
///
/// `remove_record` and `confirm_record` exist because replay has to
/// reconcile placeholder ids with server-assigned ones inside the view the
/// application is showing; a snapshot-only interface cannot express that.
#[async_trait]
pub trait EditableEndpoint: Send + Sync {
	/// Stable endpoint identifier
	fn endpoint_id(&self) -> &str;

	/// Apply a combined change set in one remote call
	async fn apply_changes(&self, changes: &ChangeSet) -> Result<ApplyResponse, EndpointError>;

	/// Snapshot of the live in-memory view
	async fn current_records(&self) -> Vec<FeatureRecord>;

	/// Drop a record from the live view (stale placeholder copy about to be
	/// replaced by the server-confirmed record)
	async fn remove_record(&self, record_id: i64);

	/// Reflect a confirmed server id for a record created offline
	async fn confirm_record(&self, temp_id: i64, server_id: i64);
}

/// Runtime registry of endpoint adapters, endpoint id -> adapter
pub struct EndpointRegistry {
	endpoints: RwLock<HashMap<String, Arc<dyn EditableEndpoint>>>,
}

impl EndpointRegistry {
	pub fn new() -> Self {
		Self {
			endpoints: RwLock::new(HashMap::new()),
		}
	}

	pub async fn register(&self, endpoint: Arc<dyn EditableEndpoint>) {
		let id = endpoint.endpoint_id().to_string();
		self.endpoints.write().await.insert(id, endpoint);
	}

	pub async fn get(&self, endpoint_id: &str) -> Option<Arc<dyn EditableEndpoint>> {
		self.endpoints.read().await.get(endpoint_id).cloned()
	}

	pub async fn ids(&self) -> Vec<String> {
		self.endpoints.read().await.keys().cloned().collect()
	}
}

impl Default for EndpointRegistry {
	fn default() -> Self {
		Self::new()
	}
}
