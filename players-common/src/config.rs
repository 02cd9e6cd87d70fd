//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every value in it is
//! optional: a missing file is not an error, the service starts on compiled
//! defaults and logs a warning. A file that exists but cannot be parsed is a
//! configuration error.
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PLAYERS_ROOT_FOLDER";

/// Environment variable overriding the TOML config file location
pub const CONFIG_PATH_ENV: &str = "PLAYERS_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "players.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path, overrides `<root_folder>/players.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Steam Web API key
    #[serde(default)]
    pub steam_web_api_key: Option<String>,

    /// Number of stale players refreshed per cycle
    #[serde(default)]
    pub players_per_update: Option<i64>,

    /// Seconds between the start of consecutive cycles
    #[serde(default)]
    pub update_interval_secs: Option<u64>,

    /// Steam Web API request rate ceiling
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default TOML location for a module, e.g. `~/.config/players/players-service.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("players").join(format!("{}.toml", module_name)))
}

/// Pick the TOML path: explicit argument, then `PLAYERS_CONFIG`, then the platform default
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path(module_name)
}

/// Load TOML configuration, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using built-in defaults)",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    debug!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Resolve root folder following the documented priority order
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/players (or /var/lib/players for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("players"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/players"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("players"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/players"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("players"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\players"))
    } else {
        PathBuf::from("./players_data")
    }
}

/// Create the root folder if it does not exist yet
pub fn ensure_directory_exists(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        debug!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}
