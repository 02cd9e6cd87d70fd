//! Test Helper Utilities
//!
//! Shared utilities for testing players-service

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{create_file_store, create_memory_store, seed_players};
pub use fakes::{
    profile, FailingProgress, FlakyStore, RecordingTelemetry, ScriptedEnrichment, ScriptedFault,
};
