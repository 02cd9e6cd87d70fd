//! players-service - Steam player refresher
//!
//! Every update interval, picks the least recently updated players, looks
//! them up through the Steam Web API and writes the reconciled records back
//! to the SQLite database. Without an API key an offline client stands in
//! for Steam.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use players_common::config::{
    ensure_directory_exists, load_toml_config, resolve_config_path, TomlConfig,
};
use players_common::events::{EventBus, PlayersEvent};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use players_service::config::{CliOverrides, PlayersSettings};
use players_service::db::{self, SqlitePlayerStore};
use players_service::models::SteamId;
use players_service::services::{EnrichmentService, OfflineSteamClient, SteamWebApiClient};
use players_service::{CycleOrchestrator, RunMode};

const MODULE_NAME: &str = "players-service";

/// Command-line arguments for players-service
#[derive(Parser, Debug)]
#[command(name = "players-service")]
#[command(about = "Refreshes Steam player records on a schedule")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/players/players-service.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Database file (default: <root folder>/players.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Players refreshed per cycle
    #[arg(long)]
    players: Option<i64>,

    /// Seconds between cycle starts
    #[arg(long)]
    interval: Option<u64>,

    /// Steam Web API key
    #[arg(long)]
    apikey: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Register comma-separated Steam IDs and exit
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    add: Option<Vec<SteamId>>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            root_folder: self.root_folder.clone(),
            database_path: self.database.clone(),
            players_per_update: self.players,
            update_interval_secs: self.interval,
            steam_web_api_key: self.apikey.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML is read before logging starts so that it can set the log level
    let config_path = resolve_config_path(args.config.as_deref(), MODULE_NAME);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => TomlConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {} {}", MODULE_NAME, env!("PLAYERS_BUILD_ID"));
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file not found: {} (using defaults)", path.display()),
        None => warn!("No config directory available (using defaults)"),
    }

    let settings = PlayersSettings::resolve(&args.overrides(), &toml_config)
        .context("Invalid configuration")?;
    info!("Root folder: {}", settings.root_folder.display());
    info!("Database: {}", settings.database_path.display());

    ensure_directory_exists(&settings.root_folder)
        .context("Failed to initialize root folder")?;

    let pool = db::init_database_pool(&settings.database_path).await?;
    let store = Arc::new(SqlitePlayerStore::new(pool));
    info!("Database connection established");

    if let Some(ids) = &args.add {
        let inserted = store
            .add_players(ids)
            .await
            .context("Failed to register players")?;
        info!(
            "Registered {} new player(s) ({} already known)",
            inserted,
            (ids.len() as u64).saturating_sub(inserted)
        );
        return Ok(());
    }

    let enrichment: Arc<dyn EnrichmentService> = match &settings.steam_web_api_key {
        Some(key) => Arc::new(
            SteamWebApiClient::new(key.clone(), settings.requests_per_second)
                .context("Failed to create Steam Web API client")?,
        ),
        None => {
            warn!("No Steam Web API key configured, using offline client");
            Arc::new(OfflineSteamClient::new())
        }
    };

    let event_bus = EventBus::new(100);
    spawn_cycle_logger(&event_bus);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let orchestrator = CycleOrchestrator::new(
        store,
        enrichment,
        Arc::new(event_bus),
        settings.update,
    );

    let mode = if args.once {
        RunMode::Once
    } else {
        RunMode::Continuous
    };
    orchestrator.run(mode, cancel).await;

    info!("Shutdown complete");
    Ok(())
}

/// Log cycle outcomes published on the event bus
fn spawn_cycle_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PlayersEvent::CycleCompleted {
                    cycle_id,
                    success,
                    rows_affected,
                    duration_ms,
                    ..
                }) => {
                    info!(
                        cycle_id = %cycle_id,
                        success,
                        rows_affected = rows_affected.unwrap_or(0),
                        duration_ms,
                        "Cycle finished"
                    );
                }
                Ok(PlayersEvent::ExceptionTracked {
                    operation,
                    message,
                    transient,
                    ..
                }) => {
                    tracing::debug!(
                        operation = %operation,
                        transient,
                        "Exception tracked: {}",
                        message
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cycle logger lagged behind event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
