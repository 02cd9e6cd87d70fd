//! Event types for the players event system
//!
//! Provides shared event definitions and the EventBus used for telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Players service event types
///
/// Events are broadcast via EventBus and can be serialized for external sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayersEvent {
    /// Update cycle started
    CycleStarted {
        cycle_id: Uuid,
        /// Configured number of players to refresh
        players_per_update: i64,
        timestamp: DateTime<Utc>,
    },

    /// Update cycle reached a terminal state other than cancellation
    CycleCompleted {
        cycle_id: Uuid,
        /// False when any step failed fatally
        success: bool,
        /// Rows reported by the store (only on success)
        rows_affected: Option<u64>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Update cycle abandoned because of cancellation (not a failure)
    CycleCancelled {
        cycle_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A named operation inside a cycle finished ("Download players", "Store players")
    OperationCompleted {
        cycle_id: Uuid,
        operation: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error was observed, whether or not it was retried
    ExceptionTracked {
        cycle_id: Option<Uuid>,
        operation: String,
        message: String,
        transient: bool,
        timestamp: DateTime<Utc>,
    },
}

impl PlayersEvent {
    /// Event type name, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayersEvent::CycleStarted { .. } => "CycleStarted",
            PlayersEvent::CycleCompleted { .. } => "CycleCompleted",
            PlayersEvent::CycleCancelled { .. } => "CycleCancelled",
            PlayersEvent::OperationCompleted { .. } => "OperationCompleted",
            PlayersEvent::ExceptionTracked { .. } => "ExceptionTracked",
        }
    }
}

/// Broadcast bus for PlayersEvent
///
/// Cloning the bus clones the sender; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayersEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers start lagging
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayersEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayersEvent) {
        let _ = self.tx.send(event);
    }
}
