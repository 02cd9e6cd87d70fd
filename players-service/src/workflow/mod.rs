//! Update cycle orchestration and scheduling

pub mod cycle_orchestrator;

pub use cycle_orchestrator::{CycleOrchestrator, RunMode};
