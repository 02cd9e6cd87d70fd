//! Steam Web API client
//!
//! Looks up player profiles through `ISteamUser/GetPlayerSummaries/v0002`.
//! Only `steamid`, `personaname` and `avatar` are read from the response.
//!
//! Requests are rate limited with a token bucket shared by every batch of a
//! cycle. Status codes are classified for the retry policy:
//! - 408, 429, 5xx: transient
//! - 401, 403: fatal (bad or revoked key)
//! - anything else outside 2xx: fatal

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{PlayersError, PlayersResult};
use crate::models::{PlayerProfile, SteamId};
use crate::services::traits::{EnrichmentService, ProgressSink};

const STEAM_WEB_API_BASE_URL: &str = "https://api.steampowered.com";
const PLAYER_SUMMARIES_PATH: &str = "/ISteamUser/GetPlayerSummaries/v0002/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Documented maximum of Steam IDs per `GetPlayerSummaries` call
pub const MAX_STEAM_IDS_PER_CALL: usize = 100;

#[derive(Debug, Deserialize)]
struct PlayerSummariesEnvelope {
    response: PlayerSummaries,
}

#[derive(Debug, Deserialize)]
struct PlayerSummaries {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    /// Decimal string, not a JSON number
    steamid: String,
    #[serde(default)]
    personaname: String,
    #[serde(default)]
    avatar: String,
}

/// Steam Web API enrichment client
pub struct SteamWebApiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SteamWebApiClient {
    /// Create a client for the public Steam Web API
    ///
    /// # Arguments
    /// * `api_key` - Steam Web API key
    /// * `requests_per_second` - Token bucket refill rate shared by all batches
    pub fn new(api_key: String, requests_per_second: NonZeroU32) -> PlayersResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("players-service/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlayersError::Fatal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: STEAM_WEB_API_BASE_URL.to_string(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    /// Point the client at another host (test servers, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, PLAYER_SUMMARIES_PATH)
    }
}

#[async_trait]
impl EnrichmentService for SteamWebApiClient {
    fn name(&self) -> &'static str {
        "steam-web-api"
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
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PlayersError::Cancelled),
            _ = self.rate_limiter.until_ready() => {}
        }

        let steam_ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        tracing::debug!(players = ids.len(), "Querying GetPlayerSummaries");

        let request = self
            .http_client
            .get(self.endpoint())
            .query(&[("key", self.api_key.as_str()), ("steamids", steam_ids.as_str())]);

        // URLs carry the API key, strip them from reqwest errors
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PlayersError::Cancelled),
            response = request.send() => response.map_err(|e| PlayersError::from(e.without_url()))?,
        };

        classify_status(response.status())?;

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(PlayersError::Cancelled),
            body = response.bytes() => body.map_err(|e| PlayersError::from(e.without_url()))?,
        };

        if let Err(e) = progress.report(body.len() as u64) {
            tracing::debug!(error = %e, "Ignoring progress sink failure");
        }

        parse_player_summaries(&body)
    }
}

/// Map an HTTP status onto the fault taxonomy (`Ok` for 2xx)
pub fn classify_status(status: StatusCode) -> PlayersResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let message = format!("GetPlayerSummaries returned HTTP {}", status);
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Err(PlayersError::TransientRemote {
                status: Some(status.as_u16()),
                message,
            })
        }
        s if s.is_server_error() => Err(PlayersError::TransientRemote {
            status: Some(s.as_u16()),
            message,
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PlayersError::Fatal(format!(
            "{} (check the Steam Web API key)",
            message
        ))),
        _ => Err(PlayersError::Fatal(message)),
    }
}

/// Parse a `GetPlayerSummaries` body into profiles
pub fn parse_player_summaries(body: &[u8]) -> PlayersResult<Vec<PlayerProfile>> {
    let envelope: PlayerSummariesEnvelope = serde_json::from_slice(body).map_err(|e| {
        PlayersError::Fatal(format!("Malformed GetPlayerSummaries response: {}", e))
    })?;

    envelope
        .response
        .players
        .into_iter()
        .map(|player| {
            let steam_id = player.steamid.parse::<SteamId>().map_err(|_| {
                PlayersError::Fatal(format!(
                    "Malformed steamid in GetPlayerSummaries response: {:?}",
                    player.steamid
                ))
            })?;
            Ok(PlayerProfile {
                steam_id,
                name: player.personaname,
                avatar: player.avatar,
            })
        })
        .collect()
}
