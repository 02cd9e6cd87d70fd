//! Bulk persistence step
//!
//! Wraps `SourceOfTruth::persist` with the transient fault retry policy and
//! cancellation. The store is called for every cycle, including empty ones
//! (the store treats an empty slice as a no-op).

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{PlayersError, PlayersResult};
use crate::models::PlayerRecord;
use crate::services::traits::SourceOfTruth;
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Operation name used in logs, retries and telemetry
pub const STORE_PLAYERS: &str = "Store players";

/// Upsert `players`, retrying transient storage faults
///
/// `on_retry` receives each transient error before its backoff sleep.
///
/// # Returns
/// Rows affected as reported by the store.
///
/// # Errors
/// `Cancelled` when `cancel` fires before or during the call,
/// `RetriesExhausted` when every attempt failed transiently, the store's
/// error unchanged when it is fatal.
pub async fn store_players<R>(
    store: &dyn SourceOfTruth,
    players: &[PlayerRecord],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    on_retry: R,
) -> PlayersResult<u64>
where
    R: FnMut(&PlayersError, u32, Duration),
{
    let rows_affected = retry_transient(
        STORE_PLAYERS,
        policy,
        cancel,
        on_retry,
        move || async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(PlayersError::Cancelled),
                result = store.persist(players) => result,
            }
        },
    )
    .await?;

    tracing::info!(players = players.len(), rows_affected, "Stored players");
    Ok(rows_affected)
}
