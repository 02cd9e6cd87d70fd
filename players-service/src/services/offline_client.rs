//! Offline enrichment fallback
//!
//! Stands in for the Steam Web API when no key is configured, so that the
//! pipeline can run end to end against a local database. Answers are a pure
//! function of the Steam ID: every seventh id is unknown, the rest get a
//! generated persona name and avatar.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{PlayersError, PlayersResult};
use crate::models::{PlayerProfile, SteamId};
use crate::services::steam_client::MAX_STEAM_IDS_PER_CALL;
use crate::services::traits::{EnrichmentService, ProgressSink};

const UNKNOWN_ID_MODULUS: SteamId = 7;

#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSteamClient;

impl OfflineSteamClient {
    pub fn new() -> Self {
        Self
    }

    fn lookup(steam_id: SteamId) -> Option<PlayerProfile> {
        if steam_id % UNKNOWN_ID_MODULUS == 0 {
            return None;
        }
        Some(PlayerProfile {
            steam_id,
            name: format!("Player {}", steam_id),
            avatar: format!("https://avatars.steamstatic.com/offline/{}.jpg", steam_id),
        })
    }
}

#[async_trait]
impl EnrichmentService for OfflineSteamClient {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn max_batch_size(&self) -> usize {
        MAX_STEAM_IDS_PER_CALL
    }

    async fn fetch_profiles(
        &self,
        ids: &[SteamId],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> PlayersResult<Vec<PlayerProfile>> {
        if cancel.is_cancelled() {
            return Err(PlayersError::Cancelled);
        }

        let profiles: Vec<PlayerProfile> = ids.iter().copied().filter_map(Self::lookup).collect();

        // Rough size of the equivalent JSON payload
        let bytes: usize = profiles
            .iter()
            .map(|p| p.name.len() + p.avatar.len() + 64)
            .sum();
        if let Err(e) = progress.report(bytes as u64) {
            tracing::debug!(error = %e, "Ignoring progress sink failure");
        }

        Ok(profiles)
    }
}
