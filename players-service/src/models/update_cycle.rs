//! Update cycle state machine
//!
//! A cycle progresses SELECTING → ENRICHING → RECONCILING → PERSISTING and
//! returns to IDLE. Any fatal step error moves it to FAILED, cancellation to
//! CANCELLED; both are terminal for the cycle, the scheduler then idles until
//! the next tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlayersError;

/// Update cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleState {
    /// Waiting for the next tick (also the state after a successful cycle)
    Idle,
    /// Reading the least recently updated players
    Selecting,
    /// Fetching Steam profiles in batches
    Enriching,
    /// Merging profiles onto the selected players
    Reconciling,
    /// Bulk upserting the reconciled players
    Persisting,
    /// A step failed fatally
    Failed,
    /// Cancellation was observed
    Cancelled,
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub cycle_id: Uuid,
    pub old_state: CycleState,
    pub new_state: CycleState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory record of one update cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCycle {
    /// Unique cycle identifier
    pub cycle_id: Uuid,

    /// Current state
    pub state: CycleState,

    /// Number of stale players selected
    pub players_selected: usize,

    /// Number of enrichment calls issued
    pub batches: usize,

    /// Bytes received from the enrichment service
    pub bytes_received: u64,

    /// Players Steam returned a profile for
    pub players_found: usize,

    /// Rows reported by the store
    pub rows_affected: u64,

    /// Every transition taken, in order
    pub transitions: Vec<StateTransition>,

    pub started_at: DateTime<Utc>,

    /// Set once the cycle leaves the pipeline (Idle, Failed or Cancelled)
    pub ended_at: Option<DateTime<Utc>>,
}

impl UpdateCycle {
    pub fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            state: CycleState::Idle,
            players_selected: 0,
            batches: 0,
            bytes_received: 0,
            players_found: 0,
            rows_affected: 0,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: CycleState) -> StateTransition {
        let transition = StateTransition {
            cycle_id: self.cycle_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if matches!(
            new_state,
            CycleState::Idle | CycleState::Failed | CycleState::Cancelled
        ) {
            self.ended_at = Some(transition.transitioned_at);
        }

        self.transitions.push(transition.clone());
        transition
    }

    /// States visited after the initial Idle, in order
    pub fn visited_states(&self) -> Vec<CycleState> {
        self.transitions.iter().map(|t| t.new_state).collect()
    }

    /// Milliseconds between start and end (or now, if still running)
    pub fn elapsed_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

impl Default for UpdateCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// How a cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Succeeded { rows_affected: u64 },
    Failed { error: PlayersError },
    Cancelled,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }
}

/// Result of `CycleOrchestrator::run_cycle`
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: UpdateCycle,
    pub outcome: CycleOutcome,
}
