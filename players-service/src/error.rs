//! Error types for players-service
//!
//! Every pipeline step returns `Result<T, PlayersError>`. The orchestrator
//! inspects `is_transient()` to decide between retry and escalation.

use thiserror::Error;

/// Result type for pipeline operations
pub type PlayersResult<T> = Result<T, PlayersError>;

/// Pipeline error taxonomy
#[derive(Debug, Clone, Error)]
pub enum PlayersError {
    /// Caller passed an out-of-range `limit`
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller passed an out-of-range batch size
    #[error("Argument out of range: {name} = {value} (allowed 1..={max})")]
    ArgumentOutOfRange {
        name: &'static str,
        value: usize,
        max: usize,
    },

    /// Timeout, connection reset, 408/429/5xx from a remote service
    #[error("Transient remote fault: {message}")]
    TransientRemote {
        status: Option<u16>,
        message: String,
    },

    /// An enrichment batch exhausted its retry budget
    #[error("Remote service unavailable after {attempts} attempts: {last_error}")]
    RemoteUnavailable { attempts: u32, last_error: String },

    /// Storage-layer failure
    #[error("Persistence error: {message}")]
    Persistence { transient: bool, message: String },

    /// A retried operation other than enrichment exhausted its budget
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// Auth failure, malformed response, anything not worth retrying
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Cancellation was observed
    #[error("Operation cancelled")]
    Cancelled,
}

impl PlayersError {
    /// Whether the retry policy may try the operation again
    pub fn is_transient(&self) -> bool {
        match self {
            PlayersError::TransientRemote { .. } => true,
            PlayersError::Persistence { transient, .. } => *transient,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlayersError::Cancelled)
    }
}

/// SQLite result codes that clear up on their own (SQLITE_BUSY, SQLITE_LOCKED
/// and their extended variants share the low byte)
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for PlayersError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db_err) => {
                let code_is_busy = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                    .unwrap_or(false);
                code_is_busy || db_err.message().contains("database is locked")
            }
            _ => false,
        };

        PlayersError::Persistence {
            transient,
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PlayersError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            PlayersError::TransientRemote {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            PlayersError::Fatal(format!("Malformed response: {}", err))
        } else {
            PlayersError::Fatal(err.to_string())
        }
    }
}
