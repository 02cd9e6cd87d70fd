//! players-service library interface
//!
//! Periodically refreshes player records from the Steam Web API:
//! select the stale players, enrich them in rate-limited batches, reconcile
//! the responses and bulk-upsert the result.
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::config::{PlayersSettings, UpdateSettings};
pub use crate::error::{PlayersError, PlayersResult};
pub use crate::workflow::{CycleOrchestrator, RunMode};
