//! Edit log entity
//!
//! One row per pending (endpoint, record) pair. The `key` column is the
//! only addressable handle: a second submission against the same record
//! overwrites this row instead of appending a new one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::EditOperation;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "edit_log")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	/// `<endpoint_id>/<record_id>`, unique per store
	#[sea_orm(unique)]
	pub key: String,

	#[sea_orm(indexed)]
	pub endpoint_id: String,

	/// Record id; negative while the record only exists locally
	pub record_id: i64,

	pub operation: Operation,

	/// Full JSON snapshot of the record at queue time
	#[sea_orm(column_type = "Text")]
	pub payload: String,

	pub queued_at: DateTimeUtc,
}

/// Pending operation kind as persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Operation {
	#[sea_orm(string_value = "create")]
	Create,
	#[sea_orm(string_value = "update")]
	Update,
	#[sea_orm(string_value = "delete")]
	Delete,
}

impl From<EditOperation> for Operation {
	fn from(op: EditOperation) -> Self {
		match op {
			EditOperation::Create => Operation::Create,
			EditOperation::Update => Operation::Update,
			EditOperation::Delete => Operation::Delete,
		}
	}
}

impl From<Operation> for EditOperation {
	fn from(op: Operation) -> Self {
		match op {
			Operation::Create => EditOperation::Create,
			Operation::Update => EditOperation::Update,
			Operation::Delete => EditOperation::Delete,
		}
	}
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
