//! Event bus for decoupled communication with the embedding application

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::infrastructure::remote::ApplyResponse;
use crate::services::connectivity::ConnectivityState;

/// Outcome summary of one submission batch
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchSummary {
	pub batch_id: Uuid,
	pub endpoint_id: String,
	pub accepted: usize,
	pub rejected: usize,
}

/// Engine events
#[derive(Debug, Clone)]
pub enum Event {
	/// A submission batch was validated and persisted to the edit log
	EditsEnqueued { summary: BatchSummary },

	/// A submission batch was not (fully) persisted
	EditsEnqueuedError {
		summary: BatchSummary,
		message: String,
	},

	/// A submission batch was forwarded straight to the remote service
	/// while online
	EditsSent {
		endpoint_id: String,
		response: ApplyResponse,
	},

	/// Connectivity state changed
	ConnectivityChanged { state: ConnectivityState },

	/// A replay pass finished
	ReplayCompleted {
		success: bool,
		synced: usize,
		failed: usize,
	},
}

/// Event bus for broadcasting events
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// Create a new event bus with specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event
	pub fn emit(&self, event: Event) {
		// Ignore send errors (no receivers)
		let _ = self.sender.send(event);
	}

	/// Subscribe to events
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}
