//! Configuration resolution for players-service
//!
//! Every setting is resolved once at startup with the priority
//! CLI argument → environment variable → TOML file → compiled default,
//! and the result is immutable for the life of the process.

use players_common::config::{
    database_path, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV,
};
use players_common::{Error, Result};
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const STEAM_WEB_API_KEY_ENV: &str = "PLAYERS_STEAM_WEB_API_KEY";
pub const PLAYERS_PER_UPDATE_ENV: &str = "PLAYERS_PER_UPDATE";
pub const UPDATE_INTERVAL_ENV: &str = "PLAYERS_UPDATE_INTERVAL_SECS";

pub const DEFAULT_PLAYERS_PER_UPDATE: i64 = 100;
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub players_per_update: Option<i64>,
    pub update_interval_secs: Option<u64>,
    pub steam_web_api_key: Option<String>,
}

/// Settings consumed by the cycle orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Players selected per cycle (≥ 1)
    pub players_per_update: i64,
    /// Time between cycle starts
    pub update_interval: Duration,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            players_per_update: DEFAULT_PLAYERS_PER_UPDATE,
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
        }
    }
}

/// Fully resolved service settings
#[derive(Clone)]
pub struct PlayersSettings {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    /// `None` selects the offline enrichment client
    pub steam_web_api_key: Option<String>,
    pub update: UpdateSettings,
    pub requests_per_second: NonZeroU32,
    pub log_level: String,
}

// Keeps the API key out of logs
impl fmt::Debug for PlayersSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayersSettings")
            .field("root_folder", &self.root_folder)
            .field("database_path", &self.database_path)
            .field(
                "steam_web_api_key",
                &self.steam_web_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("update", &self.update)
            .field("requests_per_second", &self.requests_per_second)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl PlayersSettings {
    /// Resolve all settings from CLI overrides, environment and TOML
    ///
    /// # Errors
    /// `Error::Config` for unparseable environment values, a
    /// `players_per_update` below 1, a zero update interval or a zero
    /// request rate.
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let root_folder =
            resolve_root_folder(cli.root_folder.as_deref(), ROOT_FOLDER_ENV, toml_config);

        let database_path = cli
            .database_path
            .clone()
            .or_else(|| toml_config.database_path.clone())
            .unwrap_or_else(|| database_path(&root_folder));

        let players_per_update = resolve_players_per_update(cli.players_per_update, toml_config)?;
        let update_interval = resolve_update_interval(cli.update_interval_secs, toml_config)?;

        let requests_per_second = toml_config
            .requests_per_second
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        let requests_per_second = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            Error::Config("requests_per_second must be at least 1".to_string())
        })?;

        Ok(Self {
            root_folder,
            database_path,
            steam_web_api_key: resolve_steam_web_api_key(
                cli.steam_web_api_key.as_deref(),
                toml_config,
            ),
            update: UpdateSettings {
                players_per_update,
                update_interval,
            },
            requests_per_second,
            log_level: toml_config.logging.level.clone(),
        })
    }
}

/// Resolve the number of players refreshed per cycle
pub fn resolve_players_per_update(cli: Option<i64>, toml_config: &TomlConfig) -> Result<i64> {
    let value = match cli {
        Some(value) => value,
        None => env_value::<i64>(PLAYERS_PER_UPDATE_ENV)?
            .or(toml_config.players_per_update)
            .unwrap_or(DEFAULT_PLAYERS_PER_UPDATE),
    };

    if value < 1 {
        return Err(Error::Config(format!(
            "players_per_update must be at least 1, got {}",
            value
        )));
    }
    Ok(value)
}

/// Resolve the time between cycle starts
pub fn resolve_update_interval(cli: Option<u64>, toml_config: &TomlConfig) -> Result<Duration> {
    let secs = match cli {
        Some(secs) => secs,
        None => env_value::<u64>(UPDATE_INTERVAL_ENV)?
            .or(toml_config.update_interval_secs)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS),
    };

    if secs == 0 {
        return Err(Error::Config(
            "update interval must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Resolve the Steam Web API key
///
/// **Priority:** CLI → ENV → TOML. Returns `None` when no source has a
/// valid key; the caller then falls back to the offline client.
pub fn resolve_steam_web_api_key(cli: Option<&str>, toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(STEAM_WEB_API_KEY_ENV).ok();
    let candidates = [
        ("command line", cli.map(str::to_string)),
        ("environment", env_key),
        ("TOML", toml_config.steam_web_api_key.clone()),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "Steam Web API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let (source, key) = valid.into_iter().next()?;
    info!("Steam Web API key loaded from {}", source);
    Some(key)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {}={:?}: {}", name, raw, e))),
        _ => Ok(None),
    }
}
