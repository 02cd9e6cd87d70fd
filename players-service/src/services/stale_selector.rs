//! Stale player selection
//!
//! Picks the players whose data is oldest: never-updated players first, then
//! ascending `last_update`, ties broken by Steam ID. Ordering is the store's
//! responsibility; this step validates the limit and enforces the length bound.

use crate::error::{PlayersError, PlayersResult};
use crate::models::PlayerRecord;
use crate::services::traits::SourceOfTruth;

/// Up to `limit` least recently updated players
///
/// # Errors
/// `InvalidArgument` when `limit <= 0` (the store is not queried), otherwise
/// whatever the store reports.
pub async fn select_stale(
    store: &dyn SourceOfTruth,
    limit: i64,
) -> PlayersResult<Vec<PlayerRecord>> {
    if limit <= 0 {
        return Err(PlayersError::InvalidArgument(format!(
            "limit must be positive, got {}",
            limit
        )));
    }

    let mut players = store.select_stale(limit).await?;

    // Length bound holds even when the store ignores the limit
    if players.len() > limit as usize {
        tracing::warn!(
            returned = players.len(),
            limit,
            "Store returned more players than requested, truncating"
        );
        players.truncate(limit as usize);
    }

    tracing::debug!(selected = players.len(), limit, "Selected stale players");
    Ok(players)
}
