//! Connectivity state machine
//!
//! Tracks Online / Offline / Reconnecting for the whole process and
//! triggers the replay engine on reconnect. Signals come from an external
//! connectivity monitor (or manual overrides); the state always reflects
//! the most recent signal, so a disconnect that lands while a replay is in
//! flight wins even though the replay's results are still applied.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::infrastructure::events::{Event, EventBus};
use crate::services::replay::{ReplayEngine, ReplayReport};

/// Process-wide connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectivityState {
	Online,
	Offline,
	Reconnecting,
}

impl ConnectivityState {
	pub fn is_online(&self) -> bool {
		matches!(self, ConnectivityState::Online)
	}

	/// Submissions queue to the edit log in these states
	pub fn should_queue(&self) -> bool {
		matches!(
			self,
			ConnectivityState::Offline | ConnectivityState::Reconnecting
		)
	}
}

/// Signal from the external connectivity monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
	Up,
	Down,
}

/// Drives the connectivity state machine
pub struct ConnectivityService {
	state_tx: watch::Sender<ConnectivityState>,
	replay: Arc<ReplayEngine>,
	events: Arc<EventBus>,
}

impl ConnectivityService {
	pub fn new(replay: Arc<ReplayEngine>, events: Arc<EventBus>) -> Self {
		let (state_tx, _) = watch::channel(ConnectivityState::Online);
		Self {
			state_tx,
			replay,
			events,
		}
	}

	pub fn state(&self) -> ConnectivityState {
		*self.state_tx.borrow()
	}

	/// Watch handle for services that need the current state
	pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
		self.state_tx.subscribe()
	}

	/// Enter Offline; queuing starts with the next submission
	pub fn go_offline(&self) {
		if self.set_state(ConnectivityState::Offline) {
			info!("Connectivity lost, queuing edits");
		}
	}

	/// Enter Reconnecting, replay the queued log, then settle to Online.
	///
	/// The final transition is conditional: a disconnect signal that
	/// arrived while the replay was running wins, though the replay's
	/// results are still applied to the edit log.
	pub async fn go_online(&self) -> ReplayReport {
		self.set_state(ConnectivityState::Reconnecting);
		info!("Reconnecting, replaying queued edits");

		let report = self.replay.replay().await;

		let settled = self.state_tx.send_if_modified(|state| {
			if *state == ConnectivityState::Reconnecting {
				*state = ConnectivityState::Online;
				true
			} else {
				false
			}
		});

		if settled {
			self.events.emit(Event::ConnectivityChanged {
				state: ConnectivityState::Online,
			});
			debug!("Connectivity settled to online");
		} else {
			debug!(state = ?self.state(), "Replay finished but a newer signal won");
		}

		report
	}

	/// Run the state machine off an external monitor's signal stream
	pub fn spawn_monitor(self: Arc<Self>, mut signals: mpsc::Receiver<LinkSignal>) -> JoinHandle<()> {
		let service = self;
		tokio::spawn(async move {
			while let Some(signal) = signals.recv().await {
				match signal {
					LinkSignal::Down => service.go_offline(),
					LinkSignal::Up => {
						let report = service.go_online().await;
						if !report.success {
							warn!(
								errors = report.errors.len(),
								"Replay after reconnect left entries queued"
							);
						}
					}
				}
			}
			debug!("Connectivity monitor stream closed");
		})
	}

	fn set_state(&self, next: ConnectivityState) -> bool {
		let changed = self.state_tx.send_if_modified(|state| {
			if *state != next {
				*state = next;
				true
			} else {
				false
			}
		});

		if changed {
			self.events.emit(Event::ConnectivityChanged { state: next });
		}
		changed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::infrastructure::database::Database;
	use crate::infrastructure::edit_log::EditLogStore;
	use crate::infrastructure::remote::EndpointRegistry;
	use crate::domain::DEFAULT_OBJECT_ID_FIELD;

	async fn service() -> ConnectivityService {
		let db = Database::in_memory().await.unwrap();
		db.migrate().await.unwrap();
		let store = Arc::new(EditLogStore::new(db.conn().clone()));
		let registry = Arc::new(EndpointRegistry::new());
		let events = Arc::new(EventBus::default());
		let replay = Arc::new(ReplayEngine::new(
			store,
			registry,
			events.clone(),
			DEFAULT_OBJECT_ID_FIELD.to_string(),
		));
		ConnectivityService::new(replay, events)
	}

	#[tokio::test]
	async fn test_initial_state_is_online() {
		let service = service().await;
		assert_eq!(service.state(), ConnectivityState::Online);
	}

	#[tokio::test]
	async fn test_offline_then_online() {
		let service = service().await;

		service.go_offline();
		assert_eq!(service.state(), ConnectivityState::Offline);
		assert!(service.state().should_queue());

		// empty log: replay is a no-op straight to online
		let report = service.go_online().await;
		assert!(report.success);
		assert_eq!(report.synced, 0);
		assert_eq!(service.state(), ConnectivityState::Online);
	}

	#[tokio::test]
	async fn test_go_offline_is_idempotent() {
		let service = service().await;
		let mut events = service.events.subscribe();

		service.go_offline();
		service.go_offline();

		// only one transition event
		assert!(matches!(
			events.try_recv(),
			Ok(Event::ConnectivityChanged {
				state: ConnectivityState::Offline
			})
		));
		assert!(events.try_recv().is_err());
	}
}
