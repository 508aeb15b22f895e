//! Waypoint Core
//!
//! Offline-first editing engine for remote feature services. Applications
//! keep creating, updating and deleting records (geometry + attributes)
//! while the link is down; edits land in a durable local log, collapse
//! against one another per record, and replay to the remote service once
//! connectivity returns.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use config::EditorConfig;
pub use domain::{EditBatch, EditEntry, EditOperation, FeatureRecord};
pub use infrastructure::edit_log::{EditLogStore, StoreError, Usage};
pub use infrastructure::events::{BatchSummary, Event, EventBus};
pub use infrastructure::remote::{
	ApplyResponse, ChangeSet, EditResult, EditableEndpoint, EndpointError, EndpointRegistry,
};
pub use services::connectivity::{ConnectivityState, LinkSignal};
pub use services::replay::{ReplayError, ReplayReport};
pub use services::submission::{RejectReason, SubmissionOutcome, SubmissionReport};

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use infrastructure::database::Database;
use services::connectivity::ConnectivityService;
use services::replay::ReplayEngine;
use services::submission::SubmissionService;
use services::temp_ids::TempIdAllocator;

/// Install a tracing subscriber driven by `RUST_LOG`, for embedders that
/// do not bring their own
pub fn init_tracing() {
	use tracing_subscriber::EnvFilter;

	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.try_init();
}

/// The main context for offline editing.
///
/// Owns the edit log database and wires the submission gate, replay engine
/// and connectivity state machine together; everything is injected
/// explicitly, there is no ambient global state.
pub struct OfflineEditor {
	config: EditorConfig,
	// keeps the connection pool alive for the stores holding clones of it
	_db: Database,
	store: Arc<EditLogStore>,
	registry: Arc<EndpointRegistry>,
	events: Arc<EventBus>,
	allocator: Arc<TempIdAllocator>,
	submission: Arc<SubmissionService>,
	connectivity: Arc<ConnectivityService>,
}

impl OfflineEditor {
	/// Open (or create) the engine for a data directory, loading its config
	pub async fn open(data_dir: std::path::PathBuf) -> Result<Self> {
		let config = EditorConfig::load_or_create(&data_dir)?;
		Self::new(config).await
	}

	/// Initialize the engine from an explicit configuration
	pub async fn new(config: EditorConfig) -> Result<Self> {
		info!("Initializing offline editor at {:?}", config.data_dir);

		config.ensure_directories()?;

		// 1. Open the edit log database and bring the schema up to date
		let db = Database::open(&config.database_path()).await?;
		db.migrate().await?;

		// 2. Shared infrastructure
		let events = Arc::new(EventBus::default());
		let store = Arc::new(EditLogStore::new(db.conn().clone()));
		let registry = Arc::new(EndpointRegistry::new());

		// 3. Seed temporary id floors from whatever survived a restart
		let allocator = Arc::new(TempIdAllocator::new());
		allocator.initialize(&store).await?;

		// 4. Replay engine and connectivity state machine
		let replay = Arc::new(ReplayEngine::new(
			store.clone(),
			registry.clone(),
			events.clone(),
			config.object_id_field.clone(),
		));
		let connectivity = Arc::new(ConnectivityService::new(replay, events.clone()));

		// 5. Submission gate, watching the connectivity state
		let submission = Arc::new(SubmissionService::new(
			store.clone(),
			allocator.clone(),
			registry.clone(),
			events.clone(),
			connectivity.watch(),
			config.object_id_field.clone(),
			config.max_queue_bytes,
		));

		let pending = store.count().await?;
		info!(pending, "Offline editor ready");

		Ok(Self {
			config,
			_db: db,
			store,
			registry,
			events,
			allocator,
			submission,
			connectivity,
		})
	}

	/// The active configuration
	pub fn config(&self) -> &EditorConfig {
		&self.config
	}

	/// Register an endpoint adapter
	pub async fn register_endpoint(&self, endpoint: Arc<dyn EditableEndpoint>) {
		self.registry.register(endpoint).await;
	}

	/// Submit one edit; queued while offline, forwarded while online
	pub async fn submit_edit(
		&self,
		operation: EditOperation,
		endpoint_id: &str,
		record: FeatureRecord,
	) -> SubmissionOutcome {
		self.submission.submit(operation, endpoint_id, record).await
	}

	/// Submit a batch of adds/updates/deletes against one endpoint
	pub async fn submit_edits(&self, endpoint_id: &str, batch: EditBatch) -> SubmissionReport {
		self.submission.submit_batch(endpoint_id, batch).await
	}

	/// Allocate a placeholder id for a record created offline
	pub async fn next_temp_id(&self, endpoint_id: &str) -> Result<i64, StoreError> {
		self.allocator.next_temp_id(&self.store, endpoint_id).await
	}

	/// Number of edits awaiting synchronization
	pub async fn pending_edit_count(&self) -> Result<u64, StoreError> {
		self.store.count().await
	}

	/// Every edit awaiting synchronization
	pub async fn pending_edits(&self) -> Result<Vec<EditEntry>, StoreError> {
		self.store.list_all().await
	}

	/// Queue usage (approximate bytes and entry count)
	pub async fn usage(&self) -> Result<Usage, StoreError> {
		self.store.usage().await
	}

	/// Drop every queued edit, including entries still awaiting sync
	pub async fn reset_queue(&self) -> Result<(), StoreError> {
		self.store.clear().await
	}

	/// Manual override: stop forwarding and start queuing
	pub fn go_offline(&self) {
		self.connectivity.go_offline();
	}

	/// Manual override: replay the queue and settle online
	pub async fn go_online(&self) -> ReplayReport {
		self.connectivity.go_online().await
	}

	pub fn connectivity_state(&self) -> ConnectivityState {
		self.connectivity.state()
	}

	/// Drive the state machine from an external connectivity monitor
	pub fn attach_monitor(&self, signals: mpsc::Receiver<LinkSignal>) -> JoinHandle<()> {
		self.connectivity.clone().spawn_monitor(signals)
	}

	/// Subscribe to engine events
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}
}
