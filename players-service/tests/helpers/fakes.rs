//! Scripted collaborators for pipeline tests

use async_trait::async_trait;
use players_common::events::PlayersEvent;
use players_service::error::{PlayersError, PlayersResult};
use players_service::models::{PlayerProfile, PlayerRecord, SteamId};
use players_service::services::{
    EnrichmentService, ProgressError, ProgressSink, SourceOfTruth, TelemetrySink,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What a scripted enrichment call does instead of answering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFault {
    /// HTTP 503
    Transient,
    /// HTTP 403
    Fatal,
    /// Block until cancelled
    Hang,
}

/// Enrichment service with a fixed directory of profiles and a fault script
///
/// Each call consumes one entry of the fault script; once the script is
/// empty calls answer from the directory (or keep failing if `always` is set).
pub struct ScriptedEnrichment {
    directory: HashMap<SteamId, PlayerProfile>,
    max_batch_size: usize,
    script: Mutex<VecDeque<ScriptedFault>>,
    always: Option<ScriptedFault>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<SteamId>>>,
}

impl ScriptedEnrichment {
    pub fn new(profiles: Vec<PlayerProfile>) -> Self {
        Self {
            directory: profiles.into_iter().map(|p| (p.steam_id, p)).collect(),
            max_batch_size: 100,
            script: Mutex::new(VecDeque::new()),
            always: None,
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Directory where every id in `ids` is known as "name-<id>"
    pub fn knowing(ids: impl IntoIterator<Item = SteamId>) -> Self {
        Self::new(ids.into_iter().map(profile).collect())
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Fail the next `times` calls with `fault`
    pub fn fail_next(self, fault: ScriptedFault, times: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend(std::iter::repeat(fault).take(times));
        self
    }

    /// Fail every call with `fault`
    pub fn always_fail(mut self, fault: ScriptedFault) -> Self {
        self.always = Some(fault);
        self
    }

    /// Calls made, including failed attempts
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Id lists of every call, in call order
    pub fn batches(&self) -> Vec<Vec<SteamId>> {
        self.batches.lock().unwrap().clone()
    }
}

/// Profile "name-<id>" / "https://example.org/<id>.jpg"
pub fn profile(steam_id: SteamId) -> PlayerProfile {
    PlayerProfile {
        steam_id,
        name: format!("name-{}", steam_id),
        avatar: format!("https://example.org/{}.jpg", steam_id),
    }
}

#[async_trait]
impl EnrichmentService for ScriptedEnrichment {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn fetch_profiles(
        &self,
        ids: &[SteamId],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PlayersResult<Vec<PlayerProfile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(ids.to_vec());

        let fault = self.script.lock().unwrap().pop_front().or(self.always);
        match fault {
            Some(ScriptedFault::Transient) => {
                return Err(PlayersError::TransientRemote {
                    status: Some(503),
                    message: "GetPlayerSummaries returned HTTP 503 Service Unavailable".into(),
                })
            }
            Some(ScriptedFault::Fatal) => {
                return Err(PlayersError::Fatal(
                    "GetPlayerSummaries returned HTTP 403 Forbidden".into(),
                ))
            }
            Some(ScriptedFault::Hang) => {
                cancel.cancelled().await;
                return Err(PlayersError::Cancelled);
            }
            None => {}
        }

        let _ = progress.report(128 * ids.len() as u64);

        Ok(ids
            .iter()
            .filter_map(|id| self.directory.get(id).cloned())
            .collect())
    }
}

/// Telemetry sink that keeps every event
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<PlayersEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlayersEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one type (`PlayersEvent::event_type`)
    pub fn of_type(&self, event_type: &str) -> Vec<PlayersEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// `success` flags of every CycleCompleted event
    pub fn cycle_results(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PlayersEvent::CycleCompleted { success, .. } => Some(success),
                _ => None,
            })
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: PlayersEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Progress sink that always fails
pub struct FailingProgress;

impl ProgressSink for FailingProgress {
    fn report(&self, _bytes: u64) -> Result<(), ProgressError> {
        Err(ProgressError("progress channel closed".into()))
    }
}

/// Store wrapper that can report a locked database or a fatal error
pub struct FlakyStore<S> {
    inner: S,
    locked_persists: AtomicU32,
    fatal_persist: bool,
    hang_persist: bool,
    persist_calls: AtomicU32,
}

impl<S: SourceOfTruth> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locked_persists: AtomicU32::new(0),
            fatal_persist: false,
            hang_persist: false,
            persist_calls: AtomicU32::new(0),
        }
    }

    /// Report "database is locked" for the next `times` persist calls
    pub fn locked_for(self, times: u32) -> Self {
        self.locked_persists.store(times, Ordering::SeqCst);
        self
    }

    /// Fail every persist call with a non-transient error
    pub fn fatal(mut self) -> Self {
        self.fatal_persist = true;
        self
    }

    /// Never return from persist calls
    pub fn hanging(mut self) -> Self {
        self.hang_persist = true;
        self
    }

    pub fn persist_calls(&self) -> u32 {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SourceOfTruth> SourceOfTruth for FlakyStore<S> {
    async fn select_stale(&self, limit: i64) -> PlayersResult<Vec<PlayerRecord>> {
        self.inner.select_stale(limit).await
    }

    async fn persist(&self, players: &[PlayerRecord]) -> PlayersResult<u64> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang_persist {
            std::future::pending::<()>().await;
        }

        if self.fatal_persist {
            return Err(PlayersError::Persistence {
                transient: false,
                message: "FOREIGN KEY constraint failed".into(),
            });
        }

        let locked = self
            .locked_persists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if locked {
            return Err(PlayersError::Persistence {
                transient: true,
                message: "database is locked".into(),
            });
        }

        self.inner.persist(players).await
    }
}
