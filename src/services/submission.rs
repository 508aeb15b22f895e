//! Submission gate
//!
//! Sole entry point for create/update/delete requests from the application.
//! While offline (or reconnecting) every request is validated, collapsed
//! against whatever is already queued for the same record, and persisted to
//! the edit log. While online, requests bypass the queue and go straight to
//! the endpoint, with the outcome reported via events.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{edit_key, EditBatch, EditEntry, EditOperation, FeatureRecord};
use crate::infrastructure::edit_log::{EditLogStore, StoreError};
use crate::infrastructure::events::{BatchSummary, Event, EventBus};
use crate::infrastructure::remote::{ChangeSet, EndpointRegistry};
use crate::services::connectivity::ConnectivityState;
use crate::services::temp_ids::TempIdAllocator;

/// Why a submission was not queued; nothing is persisted on rejection
#[derive(Debug, Error)]
pub enum RejectReason {
	/// Update/delete without a record identifier cannot address a record
	#[error("record has no identifier")]
	MissingIdentifier,

	/// Queue capacity (configured byte budget) exceeded
	#[error("edit log capacity exceeded")]
	StorageFull,

	#[error(transparent)]
	Storage(#[from] StoreError),
}

/// Per-record outcome of a submission
#[derive(Debug)]
pub enum SubmissionOutcome {
	Accepted,
	Rejected(RejectReason),
}

impl SubmissionOutcome {
	pub fn is_accepted(&self) -> bool {
		matches!(self, SubmissionOutcome::Accepted)
	}
}

/// Outcome of one submission batch
#[derive(Debug)]
pub struct SubmissionReport {
	pub batch_id: Uuid,
	pub endpoint_id: String,
	/// One outcome per record, ordered adds, updates, deletes
	pub outcomes: Vec<SubmissionOutcome>,
}

impl SubmissionReport {
	pub fn accepted(&self) -> usize {
		self.outcomes.iter().filter(|o| o.is_accepted()).count()
	}

	pub fn rejected(&self) -> usize {
		self.outcomes.len() - self.accepted()
	}

	fn summary(&self) -> BatchSummary {
		BatchSummary {
			batch_id: self.batch_id,
			endpoint_id: self.endpoint_id.clone(),
			accepted: self.accepted(),
			rejected: self.rejected(),
		}
	}
}

/// Validates, collapses, and persists submissions
pub struct SubmissionService {
	store: Arc<EditLogStore>,
	allocator: Arc<TempIdAllocator>,
	registry: Arc<EndpointRegistry>,
	events: Arc<EventBus>,
	state: watch::Receiver<ConnectivityState>,
	object_id_field: String,
	max_queue_bytes: u64,
	/// Serializes read-modify-write sequences against the store; per-key
	/// puts and deletes are atomic on their own, the collapse lookup is not
	gate: Mutex<()>,
}

impl SubmissionService {
	pub fn new(
		store: Arc<EditLogStore>,
		allocator: Arc<TempIdAllocator>,
		registry: Arc<EndpointRegistry>,
		events: Arc<EventBus>,
		state: watch::Receiver<ConnectivityState>,
		object_id_field: String,
		max_queue_bytes: u64,
	) -> Self {
		Self {
			store,
			allocator,
			registry,
			events,
			state,
			object_id_field,
			max_queue_bytes,
			gate: Mutex::new(()),
		}
	}

	/// Submit a single record; a batch of one
	pub async fn submit(
		&self,
		operation: EditOperation,
		endpoint_id: &str,
		record: FeatureRecord,
	) -> SubmissionOutcome {
		let mut batch = EditBatch::default();
		match operation {
			EditOperation::Create => batch.adds.push(record),
			EditOperation::Update => batch.updates.push(record),
			EditOperation::Delete => batch.deletes.push(record),
		}

		let mut report = self.submit_batch(endpoint_id, batch).await;
		// batch of one always yields exactly one outcome
		report
			.outcomes
			.pop()
			.unwrap_or(SubmissionOutcome::Rejected(RejectReason::MissingIdentifier))
	}

	/// Submit a batch of records against one endpoint.
	///
	/// Emits exactly one of `EditsEnqueued`, `EditsEnqueuedError` or (via
	/// the online path) `EditsSent` per batch.
	pub async fn submit_batch(&self, endpoint_id: &str, batch: EditBatch) -> SubmissionReport {
		let batch_id = Uuid::new_v4();

		if self.state.borrow().is_online() {
			return self.send_direct(batch_id, endpoint_id, batch);
		}

		let _guard = self.gate.lock().await;

		let mut outcomes = Vec::with_capacity(batch.len());
		for (operation, record) in batch.iter_ops() {
			outcomes.push(self.queue_one(endpoint_id, operation, record.clone()).await);
		}

		let report = SubmissionReport {
			batch_id,
			endpoint_id: endpoint_id.to_string(),
			outcomes,
		};

		if report.rejected() == 0 {
			debug!(
				endpoint_id,
				accepted = report.accepted(),
				"Submission batch enqueued"
			);
			self.events.emit(Event::EditsEnqueued {
				summary: report.summary(),
			});
		} else {
			let message = report
				.outcomes
				.iter()
				.find_map(|o| match o {
					SubmissionOutcome::Rejected(reason) => Some(reason.to_string()),
					SubmissionOutcome::Accepted => None,
				})
				.unwrap_or_default();
			warn!(endpoint_id, rejected = report.rejected(), %message, "Submission batch partially rejected");
			self.events.emit(Event::EditsEnqueuedError {
				summary: report.summary(),
				message,
			});
		}

		report
	}

	/// Validate and persist one record, collapsing against the queued entry
	/// for the same key if any
	async fn queue_one(
		&self,
		endpoint_id: &str,
		operation: EditOperation,
		mut record: FeatureRecord,
	) -> SubmissionOutcome {
		let record_id = match record.id(&self.object_id_field) {
			Some(id) => id,
			// creations without an id get a placeholder; anything else has
			// no record to address
			None if operation == EditOperation::Create => {
				match self.allocator.next_temp_id(&self.store, endpoint_id).await {
					Ok(id) => {
						record.set_id(&self.object_id_field, id);
						id
					}
					Err(e) => return SubmissionOutcome::Rejected(e.into()),
				}
			}
			None => return SubmissionOutcome::Rejected(RejectReason::MissingIdentifier),
		};

		let key = edit_key(endpoint_id, record_id);
		let existing = match self.store.get(&key).await {
			Ok(existing) => existing,
			Err(e) => return SubmissionOutcome::Rejected(e.into()),
		};

		let collapsed = match existing.map(|e| e.operation) {
			// the record was created offline and the server has never seen
			// it: updates keep it a pending creation with a fresh snapshot,
			// a delete cancels it outright with no network effect
			Some(EditOperation::Create) => match operation {
				EditOperation::Create | EditOperation::Update => Some(EditOperation::Create),
				EditOperation::Delete => None,
			},
			// last write wins within the pending queue
			Some(EditOperation::Update) | Some(EditOperation::Delete) => Some(operation),
			None => Some(operation),
		};

		match collapsed {
			None => match self.store.delete(&key).await {
				Ok(()) => {
					debug!(%key, "Pending creation cancelled by delete");
					SubmissionOutcome::Accepted
				}
				Err(e) => SubmissionOutcome::Rejected(e.into()),
			},
			Some(collapsed_op) => {
				let entry = EditEntry::new(collapsed_op, endpoint_id, record_id, record);

				if let Err(reason) = self.check_capacity(&entry).await {
					return SubmissionOutcome::Rejected(reason);
				}

				match self.store.put(&entry).await {
					Ok(()) => SubmissionOutcome::Accepted,
					Err(e) => SubmissionOutcome::Rejected(e.into()),
				}
			}
		}
	}

	async fn check_capacity(&self, entry: &EditEntry) -> Result<(), RejectReason> {
		if self.max_queue_bytes == 0 {
			return Ok(());
		}

		let entry_bytes = serde_json::to_vec(entry)
			.map_err(StoreError::from)
			.map_err(RejectReason::from)?
			.len() as u64;
		let current = self.store.approximate_size_bytes().await.map_err(RejectReason::from)?;

		if current + entry_bytes > self.max_queue_bytes {
			return Err(RejectReason::StorageFull);
		}
		Ok(())
	}

	/// Online path: forward the batch to the endpoint without queuing and
	/// report the outcome via events
	fn send_direct(
		&self,
		batch_id: Uuid,
		endpoint_id: &str,
		batch: EditBatch,
	) -> SubmissionReport {
		let outcomes = (0..batch.len()).map(|_| SubmissionOutcome::Accepted).collect();
		let report = SubmissionReport {
			batch_id,
			endpoint_id: endpoint_id.to_string(),
			outcomes,
		};
		let summary = report.summary();

		let registry = self.registry.clone();
		let events = self.events.clone();
		let endpoint_id = endpoint_id.to_string();

		tokio::spawn(async move {
			let Some(endpoint) = registry.get(&endpoint_id).await else {
				warn!(%endpoint_id, "Direct send to unregistered endpoint");
				events.emit(Event::EditsEnqueuedError {
					summary,
					message: format!("endpoint {endpoint_id} is not registered"),
				});
				return;
			};

			let changes = ChangeSet {
				creates: batch.adds,
				updates: batch.updates,
				deletes: batch.deletes,
			};

			match endpoint.apply_changes(&changes).await {
				Ok(response) => {
					debug!(%endpoint_id, "Direct send applied");
					events.emit(Event::EditsSent {
						endpoint_id,
						response,
					});
				}
				Err(e) => {
					warn!(%endpoint_id, error = %e, "Direct send failed");
					events.emit(Event::EditsEnqueuedError {
						summary,
						message: e.to_string(),
					});
				}
			}
		});

		report
	}
}
