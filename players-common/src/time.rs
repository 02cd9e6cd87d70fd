//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Later of a previous timestamp (if any) and `candidate`
///
/// Used wherever a stored timestamp must never move backwards.
pub fn not_before(previous: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev > candidate => prev,
        _ => candidate,
    }
}
