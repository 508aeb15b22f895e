//! Edit Log Store
//!
//! Durable, keyed persistence for pending edits: one entry per
//! (endpoint, record) pair, keyed `<endpoint_id>/<record_id>`. Each put and
//! delete is a single SQL statement, so per-key writes are atomic; callers
//! that read-modify-write must serialize those sequences themselves.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
	ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{EditEntry, FeatureRecord};
use crate::infrastructure::database::entities::edit_entry;

/// Errors from the edit log store
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] DbErr),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Delete reported success but the key was still retrievable afterward
	#[error("delete of `{key}` not confirmed by read-back")]
	DeleteUnconfirmed { key: String },
}

/// Queue usage accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
	pub size_bytes: u64,
	pub edit_count: u64,
}

/// Keyed store over the `edit_log` table
pub struct EditLogStore {
	conn: DatabaseConnection,
}

impl EditLogStore {
	pub fn new(conn: DatabaseConnection) -> Self {
		Self { conn }
	}

	/// Insert or replace the entry for its key
	pub async fn put(&self, entry: &EditEntry) -> Result<(), StoreError> {
		let active = to_active_model(entry)?;

		edit_entry::Entity::insert(active)
			.on_conflict(
				OnConflict::column(edit_entry::Column::Key)
					.update_columns([
						edit_entry::Column::EndpointId,
						edit_entry::Column::RecordId,
						edit_entry::Column::Operation,
						edit_entry::Column::Payload,
						edit_entry::Column::QueuedAt,
					])
					.to_owned(),
			)
			.exec(&self.conn)
			.await?;

		debug!(key = %entry.key, operation = %entry.operation, "Stored edit entry");
		Ok(())
	}

	/// Fetch the entry for a key, `None` when not found
	pub async fn get(&self, key: &str) -> Result<Option<EditEntry>, StoreError> {
		let model = edit_entry::Entity::find()
			.filter(edit_entry::Column::Key.eq(key))
			.one(&self.conn)
			.await?;

		model.map(from_model).transpose()
	}

	/// All pending entries
	pub async fn list_all(&self) -> Result<Vec<EditEntry>, StoreError> {
		let models = edit_entry::Entity::find().all(&self.conn).await?;
		models.into_iter().map(from_model).collect()
	}

	/// Delete the entry for a key.
	///
	/// Idempotent: deleting an absent key is not an error. Success is only
	/// reported after a read-back confirms the key is no longer retrievable;
	/// a storage backend that acknowledges a delete without removing the row
	/// surfaces as `DeleteUnconfirmed` instead of a false positive.
	pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
		let result = edit_entry::Entity::delete_many()
			.filter(edit_entry::Column::Key.eq(key))
			.exec(&self.conn)
			.await?;

		if self.get(key).await?.is_some() {
			warn!(key, "Delete acknowledged but key still present");
			return Err(StoreError::DeleteUnconfirmed {
				key: key.to_string(),
			});
		}

		debug!(key, rows = result.rows_affected, "Deleted edit entry");
		Ok(())
	}

	/// Drop every entry
	pub async fn clear(&self) -> Result<(), StoreError> {
		edit_entry::Entity::delete_many().exec(&self.conn).await?;
		Ok(())
	}

	/// Number of pending entries
	pub async fn count(&self) -> Result<u64, StoreError> {
		Ok(edit_entry::Entity::find().count(&self.conn).await?)
	}

	/// Approximate queue size: serialize each entry and sum byte lengths.
	///
	/// O(n) over all entries, acceptable because the log only holds pending
	/// edits, never full datasets.
	pub async fn approximate_size_bytes(&self) -> Result<u64, StoreError> {
		let entries = self.list_all().await?;
		let mut total = 0u64;
		for entry in &entries {
			total += serde_json::to_vec(entry)?.len() as u64;
		}
		Ok(total)
	}

	/// Usage summary for the application
	pub async fn usage(&self) -> Result<Usage, StoreError> {
		Ok(Usage {
			size_bytes: self.approximate_size_bytes().await?,
			edit_count: self.count().await?,
		})
	}
}

fn to_active_model(entry: &EditEntry) -> Result<edit_entry::ActiveModel, StoreError> {
	Ok(edit_entry::ActiveModel {
		id: ActiveValue::NotSet,
		key: ActiveValue::Set(entry.key.clone()),
		endpoint_id: ActiveValue::Set(entry.endpoint_id.clone()),
		record_id: ActiveValue::Set(entry.record_id),
		operation: ActiveValue::Set(entry.operation.into()),
		payload: ActiveValue::Set(serde_json::to_string(&entry.payload)?),
		queued_at: ActiveValue::Set(entry.queued_at),
	})
}

fn from_model(model: edit_entry::Model) -> Result<EditEntry, StoreError> {
	let payload: FeatureRecord = serde_json::from_str(&model.payload)?;
	Ok(EditEntry {
		key: model.key,
		operation: model.operation.into(),
		endpoint_id: model.endpoint_id,
		record_id: model.record_id,
		payload,
		queued_at: model.queued_at,
	})
}
