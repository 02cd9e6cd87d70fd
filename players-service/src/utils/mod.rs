//! Utility modules for players-service

pub mod retry;

pub use retry::{retry_transient, RetryPolicy};
