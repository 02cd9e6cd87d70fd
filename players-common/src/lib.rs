//! # Players Common Library
//!
//! Shared code for the players services including:
//! - Error types
//! - Configuration loading (TOML bootstrap, root folder resolution)
//! - Event types (PlayersEvent enum) and the EventBus
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
