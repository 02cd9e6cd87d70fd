//! Data models for players-service
//!
//! - Player records and Steam profiles
//! - Update cycle state machine

pub mod player;
pub mod update_cycle;

pub use player::{PlayerProfile, PlayerRecord, ProfileSet, SteamId};
pub use update_cycle::{CycleOutcome, CycleReport, CycleState, StateTransition, UpdateCycle};
