//! Shared test fixtures: a scriptable in-memory endpoint adapter
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use waypoint_core::{
	ApplyResponse, ChangeSet, EditResult, EditableEndpoint, EditorConfig, EndpointError,
	FeatureRecord, OfflineEditor,
};

pub const OBJECT_ID: &str = "objectid";

/// Endpoint adapter backed by an in-memory record list.
///
/// Creates get sequential server ids; individual record ids can be scripted
/// to fail, and the whole endpoint can be taken "down" to simulate a
/// network-level failure. An optional semaphore gate lets tests hold a
/// response open while they poke the engine from outside.
pub struct MockEndpoint {
	id: String,
	next_server_id: AtomicI64,
	network_down: AtomicBool,
	fail_ids: Mutex<HashSet<i64>>,
	gate: Option<Arc<Semaphore>>,

	pub records: Mutex<Vec<FeatureRecord>>,
	pub calls: Mutex<Vec<ChangeSet>>,
	pub removed: Mutex<Vec<i64>>,
	pub confirmations: Mutex<Vec<(i64, i64)>>,
}

impl MockEndpoint {
	pub fn new(id: &str, first_server_id: i64) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			next_server_id: AtomicI64::new(first_server_id),
			network_down: AtomicBool::new(false),
			fail_ids: Mutex::new(HashSet::new()),
			gate: None,
			records: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
			removed: Mutex::new(Vec::new()),
			confirmations: Mutex::new(Vec::new()),
		})
	}

	/// Like `new`, but every `apply_changes` call waits for one permit on
	/// the returned semaphore before responding
	pub fn gated(id: &str, first_server_id: i64) -> (Arc<Self>, Arc<Semaphore>) {
		let gate = Arc::new(Semaphore::new(0));
		let endpoint = Arc::new(Self {
			id: id.to_string(),
			next_server_id: AtomicI64::new(first_server_id),
			network_down: AtomicBool::new(false),
			fail_ids: Mutex::new(HashSet::new()),
			gate: Some(gate.clone()),
			records: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
			removed: Mutex::new(Vec::new()),
			confirmations: Mutex::new(Vec::new()),
		});
		(endpoint, gate)
	}

	pub fn set_network_down(&self, down: bool) {
		self.network_down.store(down, Ordering::SeqCst);
	}

	pub async fn fail_record(&self, record_id: i64) {
		self.fail_ids.lock().await.insert(record_id);
	}

	pub async fn push_record(&self, record: FeatureRecord) {
		self.records.lock().await.push(record);
	}

	async fn result_for(&self, record: &FeatureRecord) -> EditResult {
		let Some(id) = record.id(OBJECT_ID) else {
			return EditResult::failed("record has no id");
		};
		if self.fail_ids.lock().await.contains(&id) {
			EditResult::failed(format!("record {id} rejected"))
		} else {
			EditResult::ok(id)
		}
	}
}

#[async_trait]
impl EditableEndpoint for MockEndpoint {
	fn endpoint_id(&self) -> &str {
		&self.id
	}

	async fn apply_changes(&self, changes: &ChangeSet) -> Result<ApplyResponse, EndpointError> {
		if let Some(gate) = &self.gate {
			let permit = gate.acquire().await.expect("gate closed");
			permit.forget();
		}

		self.calls.lock().await.push(changes.clone());

		if self.network_down.load(Ordering::SeqCst) {
			return Err(EndpointError::Unavailable("link down".to_string()));
		}

		let mut response = ApplyResponse::default();

		for record in &changes.creates {
			let server_id = self.next_server_id.fetch_add(1, Ordering::SeqCst);
			let mut stored = record.clone();
			stored.set_id(OBJECT_ID, server_id);
			self.records.lock().await.push(stored);
			response.create_results.push(EditResult::ok(server_id));
		}
		for record in &changes.updates {
			response.update_results.push(self.result_for(record).await);
		}
		for record in &changes.deletes {
			response.delete_results.push(self.result_for(record).await);
		}

		Ok(response)
	}

	async fn current_records(&self) -> Vec<FeatureRecord> {
		self.records.lock().await.clone()
	}

	async fn remove_record(&self, record_id: i64) {
		self.removed.lock().await.push(record_id);
		self.records
			.lock()
			.await
			.retain(|r| r.id(OBJECT_ID) != Some(record_id));
	}

	async fn confirm_record(&self, temp_id: i64, server_id: i64) {
		self.confirmations.lock().await.push((temp_id, server_id));
		for record in self.records.lock().await.iter_mut() {
			if record.id(OBJECT_ID) == Some(temp_id) {
				record.set_id(OBJECT_ID, server_id);
			}
		}
	}
}

/// Editor over a fresh temp-dir database
pub async fn editor(dir: &tempfile::TempDir) -> OfflineEditor {
	waypoint_core::init_tracing();
	let config = EditorConfig::default_with_dir(dir.path().to_path_buf());
	OfflineEditor::new(config).await.expect("editor init")
}

/// A point record with the given attributes
pub fn point(x: f64, y: f64) -> FeatureRecord {
	FeatureRecord::new(serde_json::json!({ "x": x, "y": y }))
}

/// A point record carrying an object id
pub fn point_with_id(id: i64) -> FeatureRecord {
	let mut record = point(0.0, 0.0);
	record.set_id(OBJECT_ID, id);
	record
}
