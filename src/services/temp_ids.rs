//! Temporary identifier allocation for records created offline
//!
//! Placeholder ids are strictly negative so they can never collide with
//! server-assigned (non-negative) ids, and monotonically decreasing so
//! queued creations on the same endpoint never collide with each other.
//! The floor is derived from a scan of the edit log, which makes the
//! scheme survive client restarts without a persisted counter.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::EditOperation;
use crate::infrastructure::edit_log::{EditLogStore, StoreError};

/// Allocates unique negative record ids per endpoint
pub struct TempIdAllocator {
	/// Next id to hand out, per endpoint; absent means not yet scanned
	next: Mutex<HashMap<String, i64>>,
}

impl TempIdAllocator {
	pub fn new() -> Self {
		Self {
			next: Mutex::new(HashMap::new()),
		}
	}

	/// Seed the per-endpoint floors from a full scan of the store.
	///
	/// A fresh scan is the source of truth after the store is opened;
	/// afterwards ids are handed out from the cache and decremented locally.
	pub async fn initialize(&self, store: &EditLogStore) -> Result<(), StoreError> {
		let entries = store.list_all().await?;
		let mut next = self.next.lock().await;
		next.clear();

		for entry in entries {
			if entry.operation != EditOperation::Create {
				continue;
			}
			let floor = next.entry(entry.endpoint_id.clone()).or_insert(-1);
			if entry.record_id <= *floor {
				*floor = entry.record_id - 1;
			}
		}

		debug!(endpoints = next.len(), "Seeded temporary id floors");
		Ok(())
	}

	/// Hand out the next temporary id for an endpoint.
	///
	/// Scans the store on first use for an endpoint the initial scan did not
	/// see; subsequent allocations decrement the cached value.
	pub async fn next_temp_id(
		&self,
		store: &EditLogStore,
		endpoint_id: &str,
	) -> Result<i64, StoreError> {
		let mut next = self.next.lock().await;

		let slot = match next.get_mut(endpoint_id) {
			Some(slot) => slot,
			None => {
				let floor = scan_floor(store, endpoint_id).await?;
				next.entry(endpoint_id.to_string()).or_insert(floor)
			}
		};

		let id = *slot;
		*slot = id - 1;
		Ok(id)
	}
}

impl Default for TempIdAllocator {
	fn default() -> Self {
		Self::new()
	}
}

/// Smallest unused negative id for an endpoint: min(queued creations) - 1,
/// or -1 when none are queued
async fn scan_floor(store: &EditLogStore, endpoint_id: &str) -> Result<i64, StoreError> {
	let entries = store.list_all().await?;
	let min = entries
		.iter()
		.filter(|e| e.operation == EditOperation::Create && e.endpoint_id == endpoint_id)
		.map(|e| e.record_id)
		.min();

	Ok(match min {
		Some(min) if min < 0 => min - 1,
		_ => -1,
	})
}
