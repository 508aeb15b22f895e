//! Replay engine
//!
//! Pushes the queued edit log to the remote service after a reconnect.
//! Entries are grouped per endpoint; every group goes out as one combined
//! remote call and all groups run concurrently. The join is all-settled: a
//! failing group never aborts its siblings, its entries simply stay queued
//! for the next reconnect.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{EditEntry, EditOperation};
use crate::infrastructure::edit_log::{EditLogStore, StoreError};
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::remote::{
	ApplyResponse, ChangeSet, EditResult, EndpointError, EndpointRegistry,
};

/// A failure recorded while replaying; the affected entries stay queued
#[derive(Debug, Error)]
pub enum ReplayError {
	#[error("endpoint {endpoint_id} is not registered")]
	UnknownEndpoint { endpoint_id: String },

	#[error("network failure replaying {endpoint_id}: {source}")]
	Network {
		endpoint_id: String,
		#[source]
		source: EndpointError,
	},

	#[error("{operation} of record {record_id} on {endpoint_id} rejected: {message}")]
	ResultRejected {
		endpoint_id: String,
		operation: EditOperation,
		record_id: i64,
		message: String,
	},

	/// The server handed back a negative id for a created record, which
	/// would collide with the placeholder id space
	#[error("server assigned invalid identifier {id} for created record {record_id} on {endpoint_id}")]
	InvalidServerId {
		endpoint_id: String,
		record_id: i64,
		id: i64,
	},

	/// The remote operation committed but local bookkeeping did not; the
	/// gate's collapse rules make the leftover entry harmless
	#[error("failed to purge synchronized entry {key}: {source}")]
	Purge {
		key: String,
		#[source]
		source: StoreError,
	},

	#[error(transparent)]
	Storage(#[from] StoreError),
}

/// Response of one endpoint group that reached the server
#[derive(Debug)]
pub struct EndpointReplayResult {
	pub endpoint_id: String,
	pub response: ApplyResponse,
}

/// Outcome of one replay pass
#[derive(Debug)]
pub struct ReplayReport {
	/// True when every queued entry synchronized and purged cleanly
	pub success: bool,
	pub results: Vec<EndpointReplayResult>,
	pub errors: Vec<ReplayError>,
	/// Entries confirmed by the server and removed from the log
	pub synced: usize,
}

impl ReplayReport {
	fn empty() -> Self {
		Self {
			success: true,
			results: Vec::new(),
			errors: Vec::new(),
			synced: 0,
		}
	}
}

/// Outcome of replaying one endpoint group
struct GroupOutcome {
	endpoint_id: String,
	response: Option<ApplyResponse>,
	/// Keys confirmed by the server, to purge after all groups settle
	purge_keys: Vec<String>,
	errors: Vec<ReplayError>,
}

/// Replays the queued edit log against the remote service
pub struct ReplayEngine {
	store: Arc<EditLogStore>,
	registry: Arc<EndpointRegistry>,
	events: Arc<EventBus>,
	object_id_field: String,
}

impl ReplayEngine {
	pub fn new(
		store: Arc<EditLogStore>,
		registry: Arc<EndpointRegistry>,
		events: Arc<EventBus>,
		object_id_field: String,
	) -> Self {
		Self {
			store,
			registry,
			events,
			object_id_field,
		}
	}

	/// Replay every queued entry.
	///
	/// Partial failure is not fatal: successful groups are reconciled and
	/// purged, failed ones stay queued, and the report carries both.
	pub async fn replay(&self) -> ReplayReport {
		let entries = match self.store.list_all().await {
			Ok(entries) => entries,
			Err(e) => {
				error!(error = %e, "Could not read edit log for replay");
				let mut report = ReplayReport::empty();
				report.success = false;
				report.errors.push(e.into());
				return report;
			}
		};

		if entries.is_empty() {
			debug!("Edit log empty, nothing to replay");
			self.events.emit(Event::ReplayCompleted {
				success: true,
				synced: 0,
				failed: 0,
			});
			return ReplayReport::empty();
		}

		let mut groups: HashMap<String, Vec<EditEntry>> = HashMap::new();
		for entry in entries {
			groups.entry(entry.endpoint_id.clone()).or_default().push(entry);
		}

		info!(
			endpoints = groups.len(),
			"Replaying queued edits"
		);

		// one combined remote call per endpoint, all endpoints in flight at
		// once; each future settles to its own outcome
		let outcomes = join_all(
			groups
				.into_iter()
				.map(|(endpoint_id, group)| self.run_group(endpoint_id, group)),
		)
		.await;

		let mut report = ReplayReport::empty();
		for outcome in outcomes {
			if let Some(response) = outcome.response {
				report.results.push(EndpointReplayResult {
					endpoint_id: outcome.endpoint_id.clone(),
					response,
				});
			}
			report.errors.extend(outcome.errors);

			for key in outcome.purge_keys {
				match self.store.delete(&key).await {
					Ok(()) => report.synced += 1,
					Err(source) => report.errors.push(ReplayError::Purge { key, source }),
				}
			}
		}

		report.success = report.errors.is_empty();

		info!(
			success = report.success,
			synced = report.synced,
			failed = report.errors.len(),
			"Replay finished"
		);
		self.events.emit(Event::ReplayCompleted {
			success: report.success,
			synced: report.synced,
			failed: report.errors.len(),
		});

		report
	}

	/// Replay one endpoint's entries as a single combined remote call
	async fn run_group(&self, endpoint_id: String, entries: Vec<EditEntry>) -> GroupOutcome {
		let mut outcome = GroupOutcome {
			endpoint_id: endpoint_id.clone(),
			response: None,
			purge_keys: Vec::new(),
			errors: Vec::new(),
		};

		let Some(endpoint) = self.registry.get(&endpoint_id).await else {
			warn!(%endpoint_id, "No adapter registered, entries stay queued");
			outcome
				.errors
				.push(ReplayError::UnknownEndpoint { endpoint_id });
			return outcome;
		};

		let mut creates = Vec::new();
		let mut updates = Vec::new();
		let mut deletes = Vec::new();
		for entry in entries {
			match entry.operation {
				EditOperation::Create => creates.push(entry),
				EditOperation::Update => updates.push(entry),
				EditOperation::Delete => deletes.push(entry),
			}
		}

		let mut changes = ChangeSet::default();
		if !creates.is_empty() {
			// the placeholder copies in the live view would duplicate the
			// server-confirmed records; drop them and let the server assign
			// real ids
			let live_ids: HashSet<i64> = endpoint
				.current_records()
				.await
				.iter()
				.filter_map(|r| r.id(&self.object_id_field))
				.collect();

			for entry in &creates {
				if live_ids.contains(&entry.record_id) {
					endpoint.remove_record(entry.record_id).await;
				}

				let mut record = entry.payload.clone();
				record.clear_id(&self.object_id_field);
				changes.creates.push(record);
			}
		}
		changes.updates = updates.iter().map(|e| e.payload.clone()).collect();
		changes.deletes = deletes.iter().map(|e| e.payload.clone()).collect();

		debug!(
			endpoint_id = %outcome.endpoint_id,
			creates = creates.len(),
			updates = updates.len(),
			deletes = deletes.len(),
			"Submitting endpoint group"
		);

		let response = match endpoint.apply_changes(&changes).await {
			Ok(response) => response,
			Err(source) => {
				warn!(endpoint_id = %outcome.endpoint_id, error = %source, "Endpoint group failed, entries stay queued");
				outcome.errors.push(ReplayError::Network {
					endpoint_id: outcome.endpoint_id.clone(),
					source,
				});
				return outcome;
			}
		};

		for (entry, result) in align(&creates, &response.create_results) {
			match result {
				Some(result) if result.success => match result.id {
					Some(server_id) if server_id >= 0 => {
						endpoint.confirm_record(entry.record_id, server_id).await;
						outcome.purge_keys.push(entry.key.clone());
					}
					Some(server_id) => {
						error!(
							endpoint_id = %outcome.endpoint_id,
							record_id = entry.record_id,
							server_id,
							"Server assigned a negative identifier"
						);
						outcome.errors.push(ReplayError::InvalidServerId {
							endpoint_id: outcome.endpoint_id.clone(),
							record_id: entry.record_id,
							id: server_id,
						});
					}
					None => outcome.errors.push(rejected(
						&outcome.endpoint_id,
						entry,
						"no identifier returned for created record",
					)),
				},
				other => outcome
					.errors
					.push(rejected(&outcome.endpoint_id, entry, failure_message(other))),
			}
		}

		for (entry, result) in align(&updates, &response.update_results)
			.chain(align(&deletes, &response.delete_results))
		{
			match result {
				Some(result) if result.success => outcome.purge_keys.push(entry.key.clone()),
				other => outcome
					.errors
					.push(rejected(&outcome.endpoint_id, entry, failure_message(other))),
			}
		}

		outcome.response = Some(response);
		outcome
	}
}

/// Pair each entry with its positionally aligned result, if the server
/// returned one
fn align<'a>(
	entries: &'a [EditEntry],
	results: &'a [EditResult],
) -> impl Iterator<Item = (&'a EditEntry, Option<&'a EditResult>)> {
	entries
		.iter()
		.enumerate()
		.map(|(i, entry)| (entry, results.get(i)))
}

fn failure_message(result: Option<&EditResult>) -> String {
	match result {
		Some(result) => result
			.error
			.clone()
			.unwrap_or_else(|| "rejected without error detail".to_string()),
		None => "no result returned".to_string(),
	}
}

fn rejected(endpoint_id: &str, entry: &EditEntry, message: impl Into<String>) -> ReplayError {
	ReplayError::ResultRejected {
		endpoint_id: endpoint_id.to_string(),
		operation: entry.operation,
		record_id: entry.record_id,
		message: message.into(),
	}
}
