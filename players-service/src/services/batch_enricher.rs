//! Batched, concurrent profile enrichment
//!
//! Splits the requested Steam IDs into consecutive batches no larger than the
//! service's per-call limit and fetches every batch on its own task. Each
//! batch is retried independently. Results are kept by batch index and
//! merged in batch order once all tasks have joined, so the first-wins rule
//! for duplicate profiles does not depend on completion order.
//!
//! The first batch to fail fatally cancels the others and fails the step.

use chrono::Utc;
use players_common::events::PlayersEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PlayersError, PlayersResult};
use crate::models::{PlayerProfile, ProfileSet, SteamId};
use crate::services::traits::{
    EnrichmentService, NullTelemetry, ProgressError, ProgressSink, TelemetrySink,
};
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Operation name used in logs, retries and telemetry
pub const DOWNLOAD_PLAYERS: &str = "Download players";

/// Outcome of a successful enrichment step
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Profiles keyed by Steam ID (first occurrence wins)
    pub profiles: ProfileSet,
    /// Number of batches issued (one enrichment call group each)
    pub calls: usize,
    /// Bytes reported by all calls, including retried attempts
    pub bytes_received: u64,
}

/// Progress sink that accumulates bytes in an atomic counter
#[derive(Debug, Default)]
pub struct DownloadProgress {
    bytes: AtomicU64,
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl ProgressSink for DownloadProgress {
    fn report(&self, bytes: u64) -> Result<(), ProgressError> {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        Ok(())
    }
}

/// Per-batch progress adapter
///
/// Counts bytes for the step total and forwards them to the caller's sink.
/// A failing caller sink is logged and otherwise ignored.
struct BatchProgress {
    batch: usize,
    total: Arc<AtomicU64>,
    inner: Arc<dyn ProgressSink>,
}

impl ProgressSink for BatchProgress {
    fn report(&self, bytes: u64) -> Result<(), ProgressError> {
        self.total.fetch_add(bytes, Ordering::Relaxed);
        if let Err(e) = self.inner.report(bytes) {
            tracing::debug!(batch = self.batch, error = %e, "Ignoring progress sink failure");
        }
        Ok(())
    }
}

/// Concurrent batch enrichment over an `EnrichmentService`
pub struct BatchEnricher {
    service: Arc<dyn EnrichmentService>,
    retry: RetryPolicy,
    telemetry: Arc<dyn TelemetrySink>,
    cycle_id: Option<Uuid>,
}

impl BatchEnricher {
    pub fn new(service: Arc<dyn EnrichmentService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            telemetry: Arc::new(NullTelemetry),
            cycle_id: None,
        }
    }

    /// Report retried faults to `telemetry`, tagged with `cycle_id`
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>, cycle_id: Uuid) -> Self {
        self.telemetry = telemetry;
        self.cycle_id = Some(cycle_id);
        self
    }

    /// Fetch profiles for `ids` in batches of at most `max_batch_size`
    ///
    /// Issues exactly `ceil(ids.len() / max_batch_size)` batches; no calls
    /// at all for empty input.
    ///
    /// # Errors
    /// - `ArgumentOutOfRange` if `max_batch_size` is 0 or above the service limit
    /// - `RemoteUnavailable` if a batch exhausted its retries
    /// - `Cancelled` if `cancel` fired
    /// - any other fatal batch error, unchanged
    pub async fn enrich(
        &self,
        ids: &[SteamId],
        max_batch_size: usize,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> PlayersResult<Enrichment> {
        let service_max = self.service.max_batch_size();
        if max_batch_size < 1 || max_batch_size > service_max {
            return Err(PlayersError::ArgumentOutOfRange {
                name: "max_batch_size",
                value: max_batch_size,
                max: service_max,
            });
        }

        if ids.is_empty() {
            return Ok(Enrichment::default());
        }

        let batch_count = ids.len().div_ceil(max_batch_size);
        let total_bytes = Arc::new(AtomicU64::new(0));
        let batch_cancel = cancel.child_token();

        tracing::debug!(
            service = self.service.name(),
            players = ids.len(),
            batches = batch_count,
            max_batch_size,
            "Starting enrichment"
        );

        let mut tasks = JoinSet::new();
        for (index, chunk) in ids.chunks(max_batch_size).enumerate() {
            let batch: Vec<SteamId> = chunk.to_vec();
            let service = Arc::clone(&self.service);
            let telemetry = Arc::clone(&self.telemetry);
            let cycle_id = self.cycle_id;
            let retry = self.retry;
            let token = batch_cancel.child_token();
            let batch_progress = BatchProgress {
                batch: index,
                total: Arc::clone(&total_bytes),
                inner: Arc::clone(&progress),
            };

            tasks.spawn(async move {
                let service = service.as_ref();
                let batch = batch.as_slice();
                let token = &token;
                let batch_progress = &batch_progress;

                let result = retry_transient(
                    DOWNLOAD_PLAYERS,
                    &retry,
                    token,
                    |err, attempt, _delay| {
                        telemetry.record(PlayersEvent::ExceptionTracked {
                            cycle_id,
                            operation: DOWNLOAD_PLAYERS.to_string(),
                            message: format!("batch {} attempt {}: {}", index, attempt, err),
                            transient: true,
                            timestamp: Utc::now(),
                        });
                    },
                    move || service.fetch_profiles(batch, batch_progress, token),
                )
                .await;

                (index, result)
            });
        }

        let mut batches: Vec<Option<Vec<PlayerProfile>>> = vec![None; batch_count];

        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((index, Ok(profiles))) => {
                    tracing::debug!(batch = index, found = profiles.len(), "Batch complete");
                    batches[index] = Some(profiles);
                    continue;
                }
                Ok((index, Err(err))) => {
                    if !err.is_cancelled() {
                        tracing::error!(batch = index, error = %err, "Batch failed, cancelling remaining batches");
                    }
                    escalate(err)
                }
                Err(join_err) => {
                    PlayersError::Fatal(format!("Enrichment batch task failed: {}", join_err))
                }
            };

            batch_cancel.cancel();
            tasks.abort_all();
            return Err(failure);
        }

        let mut profiles = ProfileSet::new();
        for batch in batches.into_iter().flatten() {
            profiles.extend(batch);
        }

        let enrichment = Enrichment {
            calls: batch_count,
            bytes_received: total_bytes.load(Ordering::Relaxed),
            profiles,
        };

        tracing::info!(
            service = self.service.name(),
            requested = ids.len(),
            found = enrichment.profiles.len(),
            duplicates = enrichment.profiles.duplicates(),
            batches = enrichment.calls,
            bytes = enrichment.bytes_received,
            "Enrichment complete"
        );

        Ok(enrichment)
    }
}

/// Exhausted batch retries mean the remote service is unavailable
fn escalate(err: PlayersError) -> PlayersError {
    match err {
        PlayersError::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => PlayersError::RemoteUnavailable {
            attempts,
            last_error,
        },
        other => other,
    }
}
