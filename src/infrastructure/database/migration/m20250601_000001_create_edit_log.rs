//! Initial edit log schema

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(EditLog::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(EditLog::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(
						ColumnDef::new(EditLog::Key)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(ColumnDef::new(EditLog::EndpointId).string().not_null())
					.col(ColumnDef::new(EditLog::RecordId).big_integer().not_null())
					.col(ColumnDef::new(EditLog::Operation).text().not_null())
					.col(ColumnDef::new(EditLog::Payload).text().not_null())
					.col(
						ColumnDef::new(EditLog::QueuedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		// Replay groups pending entries by endpoint
		manager
			.create_index(
				Index::create()
					.name("idx_edit_log_endpoint")
					.table(EditLog::Table)
					.col(EditLog::EndpointId)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(EditLog::Table).to_owned())
			.await
	}
}

/// Edit log table identifier
#[derive(DeriveIden)]
enum EditLog {
	Table,
	Id,
	Key,
	EndpointId,
	RecordId,
	Operation,
	Payload,
	QueuedAt,
}
