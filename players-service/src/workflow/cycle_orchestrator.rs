//! Update cycle orchestration
//!
//! One cycle is SELECTING → ENRICHING → RECONCILING → PERSISTING → IDLE.
//! A step only starts after the previous one succeeded. Transient faults are
//! retried inside the enrichment and persistence steps; anything that
//! escapes a step ends the cycle as FAILED (or CANCELLED when cancellation
//! was observed). Cycle failures are reported and swallowed, the scheduling
//! loop simply waits for the next tick.

use chrono::Utc;
use players_common::events::PlayersEvent;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::UpdateSettings;
use crate::error::{PlayersError, PlayersResult};
use crate::models::{CycleOutcome, CycleReport, CycleState, SteamId, UpdateCycle};
use crate::services::batch_enricher::{BatchEnricher, DownloadProgress, DOWNLOAD_PLAYERS};
use crate::services::bulk_persister::{store_players, STORE_PLAYERS};
use crate::services::reconciler::reconcile;
use crate::services::stale_selector::select_stale;
use crate::services::traits::{EnrichmentService, SourceOfTruth, TelemetrySink};
use crate::utils::retry::RetryPolicy;

/// How long the scheduling loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run a single cycle, then return
    Once,
    /// Run a cycle every update interval until cancelled
    Continuous,
}

/// Drives update cycles against injected collaborators
pub struct CycleOrchestrator {
    store: Arc<dyn SourceOfTruth>,
    enrichment: Arc<dyn EnrichmentService>,
    telemetry: Arc<dyn TelemetrySink>,
    settings: UpdateSettings,
    retry: RetryPolicy,
}

impl CycleOrchestrator {
    pub fn new(
        store: Arc<dyn SourceOfTruth>,
        enrichment: Arc<dyn EnrichmentService>,
        telemetry: Arc<dyn TelemetrySink>,
        settings: UpdateSettings,
    ) -> Self {
        Self {
            store,
            enrichment,
            telemetry,
            settings,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the default retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scheduling loop
    ///
    /// Each iteration runs one cycle, then sleeps for whatever remains of
    /// the update interval. Returns the number of cycles run.
    pub async fn run(&self, mode: RunMode, cancel: CancellationToken) -> u64 {
        let mut cycles = 0u64;

        tracing::info!(
            ?mode,
            players_per_update = self.settings.players_per_update,
            interval_secs = self.settings.update_interval.as_secs(),
            service = self.enrichment.name(),
            "Scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let tick = Instant::now();
            self.run_cycle(&cancel).await;
            cycles += 1;

            if mode == RunMode::Once {
                break;
            }

            let remaining = self.settings.update_interval.saturating_sub(tick.elapsed());
            tracing::debug!(
                next_cycle_in_ms = remaining.as_millis() as u64,
                "Waiting for next cycle"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(remaining) => {}
            }
        }

        tracing::info!(cycles, "Scheduler stopped");
        cycles
    }

    /// Run one Select → Enrich → Reconcile → Persist cycle
    ///
    /// Never fails: the outcome is part of the report and has already been
    /// sent to telemetry.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut cycle = UpdateCycle::new();
        let cycle_id = cycle.cycle_id;

        tracing::info!(
            cycle_id = %cycle_id,
            players_per_update = self.settings.players_per_update,
            "Update cycle started"
        );
        self.telemetry.record(PlayersEvent::CycleStarted {
            cycle_id,
            players_per_update: self.settings.players_per_update,
            timestamp: Utc::now(),
        });

        let outcome = match self.execute(&mut cycle, cancel).await {
            Ok(rows_affected) => {
                cycle.rows_affected = rows_affected;
                cycle.transition_to(CycleState::Idle);
                tracing::info!(
                    cycle_id = %cycle_id,
                    selected = cycle.players_selected,
                    found = cycle.players_found,
                    rows_affected,
                    duration_ms = cycle.elapsed_ms(),
                    "Update cycle completed"
                );
                self.telemetry.record(PlayersEvent::CycleCompleted {
                    cycle_id,
                    success: true,
                    rows_affected: Some(rows_affected),
                    duration_ms: cycle.elapsed_ms(),
                    timestamp: Utc::now(),
                });
                CycleOutcome::Succeeded { rows_affected }
            }
            Err(PlayersError::Cancelled) => {
                let interrupted = cycle.state;
                cycle.transition_to(CycleState::Cancelled);
                tracing::info!(
                    cycle_id = %cycle_id,
                    state = ?interrupted,
                    "Update cycle cancelled"
                );
                self.telemetry.record(PlayersEvent::CycleCancelled {
                    cycle_id,
                    timestamp: Utc::now(),
                });
                CycleOutcome::Cancelled
            }
            Err(error) => {
                let failed_in = cycle.state;
                cycle.transition_to(CycleState::Failed);
                tracing::error!(
                    cycle_id = %cycle_id,
                    state = ?failed_in,
                    error = %error,
                    "Update cycle failed"
                );
                self.telemetry.record(PlayersEvent::ExceptionTracked {
                    cycle_id: Some(cycle_id),
                    operation: format!("{:?}", failed_in),
                    message: error.to_string(),
                    transient: false,
                    timestamp: Utc::now(),
                });
                self.telemetry.record(PlayersEvent::CycleCompleted {
                    cycle_id,
                    success: false,
                    rows_affected: None,
                    duration_ms: cycle.elapsed_ms(),
                    timestamp: Utc::now(),
                });
                CycleOutcome::Failed { error }
            }
        };

        CycleReport { cycle, outcome }
    }

    async fn execute(
        &self,
        cycle: &mut UpdateCycle,
        cancel: &CancellationToken,
    ) -> PlayersResult<u64> {
        let cycle_id = cycle.cycle_id;

        ensure_not_cancelled(cancel)?;
        cycle.transition_to(CycleState::Selecting);
        let players = select_stale(self.store.as_ref(), self.settings.players_per_update).await?;
        cycle.players_selected = players.len();

        ensure_not_cancelled(cancel)?;
        cycle.transition_to(CycleState::Enriching);
        let ids: Vec<SteamId> = players.iter().map(|p| p.steam_id).collect();
        let enricher = BatchEnricher::new(Arc::clone(&self.enrichment), self.retry)
            .with_telemetry(Arc::clone(&self.telemetry), cycle_id);

        let started = Instant::now();
        let enrichment = enricher
            .enrich(
                &ids,
                self.enrichment.max_batch_size(),
                Arc::new(DownloadProgress::new()),
                cancel,
            )
            .await;
        self.track_operation(cycle_id, DOWNLOAD_PLAYERS, &enrichment, started);
        let enrichment = enrichment?;
        cycle.batches = enrichment.calls;
        cycle.bytes_received = enrichment.bytes_received;
        cycle.players_found = enrichment.profiles.len();

        ensure_not_cancelled(cancel)?;
        cycle.transition_to(CycleState::Reconciling);
        let reconciled = reconcile(players, &enrichment.profiles, Utc::now());

        ensure_not_cancelled(cancel)?;
        cycle.transition_to(CycleState::Persisting);
        let telemetry = &self.telemetry;
        let started = Instant::now();
        let stored = store_players(
            self.store.as_ref(),
            &reconciled,
            &self.retry,
            cancel,
            |err, attempt, _delay| {
                telemetry.record(PlayersEvent::ExceptionTracked {
                    cycle_id: Some(cycle_id),
                    operation: STORE_PLAYERS.to_string(),
                    message: format!("attempt {}: {}", attempt, err),
                    transient: true,
                    timestamp: Utc::now(),
                });
            },
        )
        .await;
        self.track_operation(cycle_id, STORE_PLAYERS, &stored, started);

        stored
    }

    /// Report a finished operation (cancellation is not an outcome)
    fn track_operation<T>(
        &self,
        cycle_id: Uuid,
        operation: &str,
        result: &PlayersResult<T>,
        started: Instant,
    ) {
        if matches!(result, Err(PlayersError::Cancelled)) {
            return;
        }

        self.telemetry.record(PlayersEvent::OperationCompleted {
            cycle_id,
            operation: operation.to_string(),
            success: result.is_ok(),
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> PlayersResult<()> {
    if cancel.is_cancelled() {
        Err(PlayersError::Cancelled)
    } else {
        Ok(())
    }
}
