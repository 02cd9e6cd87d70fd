//! Collaborator interfaces consumed by the update pipeline
//!
//! Implementations are chosen once at startup and passed to the
//! orchestrator as `Arc<dyn _>`.

use async_trait::async_trait;
use players_common::events::{EventBus, PlayersEvent};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::PlayersResult;
use crate::models::{PlayerProfile, PlayerRecord, SteamId};

/// Player storage: source of stale players and target of the bulk upsert
#[async_trait]
pub trait SourceOfTruth: Send + Sync {
    /// Up to `limit` players, least recently updated first (never updated first of all)
    async fn select_stale(&self, limit: i64) -> PlayersResult<Vec<PlayerRecord>>;

    /// Insert-or-update keyed by Steam ID; returns rows affected
    ///
    /// An empty slice is a no-op returning 0.
    async fn persist(&self, players: &[PlayerRecord]) -> PlayersResult<u64>;
}

/// Remote profile lookup (Steam Web API `GetPlayerSummaries`)
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Identifier for logs ("steam-web-api", "offline")
    fn name(&self) -> &'static str;

    /// Documented per-call ceiling on the number of ids
    fn max_batch_size(&self) -> usize;

    /// Profiles for whichever of `ids` the service knows
    ///
    /// Ids the service does not know are simply absent from the result.
    async fn fetch_profiles(
        &self,
        ids: &[SteamId],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PlayersResult<Vec<PlayerProfile>>;
}

/// Fire-and-forget telemetry
///
/// Implementations must never fail the caller; there is no error channel.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: PlayersEvent);
}

impl TelemetrySink for EventBus {
    fn record(&self, event: PlayersEvent) {
        self.emit_lossy(event);
    }
}

/// Telemetry sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&self, _event: PlayersEvent) {}
}

/// Progress report failure
#[derive(Debug, Error)]
#[error("Progress report failed: {0}")]
pub struct ProgressError(pub String);

/// Incremental progress (bytes received) for enrichment calls
pub trait ProgressSink: Send + Sync {
    fn report(&self, bytes: u64) -> Result<(), ProgressError>;
}
