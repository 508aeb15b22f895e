//! Offline queuing: validation, collapse rules, allocation, accounting

mod helpers;

use helpers::{editor, point, point_with_id};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use waypoint_core::{
	EditBatch, EditOperation, Event, OfflineEditor, RejectReason, SubmissionOutcome,
};

const HYDRANTS: &str = "hydrants";

async fn offline_editor(dir: &TempDir) -> OfflineEditor {
	let editor = editor(dir).await;
	editor.go_offline();
	editor
}

#[tokio::test]
async fn test_offline_create_queues_one_entry() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	let outcome = editor
		.submit_edit(EditOperation::Create, HYDRANTS, point(1.0, 2.0))
		.await;

	assert!(outcome.is_accepted());
	assert_eq!(editor.pending_edit_count().await.unwrap(), 1);

	let pending = editor.pending_edits().await.unwrap();
	assert_eq!(pending[0].operation, EditOperation::Create);
	assert_eq!(pending[0].record_id, -1);
}

#[tokio::test]
async fn test_create_then_delete_cancels_out() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	editor
		.submit_edit(EditOperation::Create, HYDRANTS, point(1.0, 2.0))
		.await;
	let outcome = editor
		.submit_edit(EditOperation::Delete, HYDRANTS, point_with_id(-1))
		.await;

	assert!(outcome.is_accepted());
	assert_eq!(editor.pending_edit_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_then_update_stays_a_create() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	editor
		.submit_edit(EditOperation::Create, HYDRANTS, point(1.0, 2.0))
		.await;

	let mut updated = point_with_id(-1);
	updated.set_attribute("status", serde_json::json!("flushed"));
	editor
		.submit_edit(EditOperation::Update, HYDRANTS, updated.clone())
		.await;

	let pending = editor.pending_edits().await.unwrap();
	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].operation, EditOperation::Create);
	assert_eq!(pending[0].payload, updated);
}

#[tokio::test]
async fn test_delete_wins_over_queued_update() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	editor
		.submit_edit(EditOperation::Update, HYDRANTS, point_with_id(7))
		.await;
	editor
		.submit_edit(EditOperation::Delete, HYDRANTS, point_with_id(7))
		.await;

	let pending = editor.pending_edits().await.unwrap();
	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].operation, EditOperation::Delete);
}

#[tokio::test]
async fn test_update_refreshes_queued_update_payload() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	editor
		.submit_edit(EditOperation::Update, HYDRANTS, point_with_id(7))
		.await;

	let mut second = point_with_id(7);
	second.set_attribute("status", serde_json::json!("broken"));
	editor
		.submit_edit(EditOperation::Update, HYDRANTS, second.clone())
		.await;

	let pending = editor.pending_edits().await.unwrap();
	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].operation, EditOperation::Update);
	assert_eq!(pending[0].payload, second);
}

#[tokio::test]
async fn test_update_without_identifier_is_rejected() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;
	let mut events = editor.subscribe();

	let outcome = editor
		.submit_edit(EditOperation::Update, HYDRANTS, point(1.0, 2.0))
		.await;

	assert!(matches!(
		outcome,
		SubmissionOutcome::Rejected(RejectReason::MissingIdentifier)
	));
	assert_eq!(editor.pending_edit_count().await.unwrap(), 0);

	match events.recv().await.unwrap() {
		Event::EditsEnqueuedError { summary, .. } => {
			assert_eq!(summary.rejected, 1);
			assert_eq!(summary.accepted, 0);
		}
		other => panic!("expected EditsEnqueuedError, got {other:?}"),
	}
}

#[tokio::test]
async fn test_offline_creates_get_descending_temp_ids() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	for _ in 0..3 {
		editor
			.submit_edit(EditOperation::Create, HYDRANTS, point(0.0, 0.0))
			.await;
	}

	let mut ids: Vec<i64> = editor
		.pending_edits()
		.await
		.unwrap()
		.iter()
		.map(|e| e.record_id)
		.collect();
	ids.sort();
	assert_eq!(ids, vec![-3, -2, -1]);
}

#[tokio::test]
async fn test_batch_emits_single_enqueued_event() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;
	let mut events = editor.subscribe();

	let batch = EditBatch {
		adds: vec![point(1.0, 1.0)],
		updates: vec![point_with_id(5)],
		deletes: vec![point_with_id(6)],
	};
	let report = editor.submit_edits(HYDRANTS, batch).await;

	assert_eq!(report.accepted(), 3);
	assert_eq!(report.rejected(), 0);

	match events.recv().await.unwrap() {
		Event::EditsEnqueued { summary } => {
			assert_eq!(summary.accepted, 3);
			assert_eq!(summary.batch_id, report.batch_id);
		}
		other => panic!("expected EditsEnqueued, got {other:?}"),
	}
	assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_usage_and_reset() {
	let dir = TempDir::new().unwrap();
	let editor = offline_editor(&dir).await;

	editor
		.submit_edit(EditOperation::Update, HYDRANTS, point_with_id(1))
		.await;
	editor
		.submit_edit(EditOperation::Update, HYDRANTS, point_with_id(2))
		.await;

	let usage = editor.usage().await.unwrap();
	assert_eq!(usage.edit_count, 2);
	assert!(usage.size_bytes > 0);

	editor.reset_queue().await.unwrap();
	assert_eq!(editor.pending_edit_count().await.unwrap(), 0);
	assert_eq!(editor.usage().await.unwrap().size_bytes, 0);
}

#[tokio::test]
async fn test_queue_survives_restart_and_allocation_continues() {
	let dir = TempDir::new().unwrap();

	{
		let editor = offline_editor(&dir).await;
		editor
			.submit_edit(EditOperation::Create, HYDRANTS, point(1.0, 1.0))
			.await;
		assert_eq!(editor.pending_edit_count().await.unwrap(), 1);
	}

	// reopen over the same data directory
	let editor = offline_editor(&dir).await;
	assert_eq!(editor.pending_edit_count().await.unwrap(), 1);

	// the allocator floor is re-derived from the persisted log
	editor
		.submit_edit(EditOperation::Create, HYDRANTS, point(2.0, 2.0))
		.await;
	let mut ids: Vec<i64> = editor
		.pending_edits()
		.await
		.unwrap()
		.iter()
		.map(|e| e.record_id)
		.collect();
	ids.sort();
	assert_eq!(ids, vec![-2, -1]);
}

#[tokio::test]
async fn test_storage_full_rejects_without_queuing() {
	let dir = TempDir::new().unwrap();
	let mut config = waypoint_core::EditorConfig::default_with_dir(dir.path().to_path_buf());
	config.max_queue_bytes = 1;
	let editor = OfflineEditor::new(config).await.unwrap();
	editor.go_offline();

	let outcome = editor
		.submit_edit(EditOperation::Update, HYDRANTS, point_with_id(1))
		.await;

	assert!(matches!(
		outcome,
		SubmissionOutcome::Rejected(RejectReason::StorageFull)
	));
	assert_eq!(editor.pending_edit_count().await.unwrap(), 0);
}
