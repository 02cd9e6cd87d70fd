//! Database Test Utilities

use anyhow::Result;
use players_service::db::{init_database_pool, init_tables, SqlitePlayerStore};
use players_service::models::PlayerRecord;
use players_service::services::SourceOfTruth;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

/// In-memory store with the players schema
///
/// Single connection: every connection to `sqlite::memory:` is its own database.
pub async fn create_memory_store() -> Result<SqlitePlayerStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(SqlitePlayerStore::new(pool))
}

/// On-disk store in a temporary directory
///
/// Returns (TempDir, store) - TempDir must be kept alive for duration of test
pub async fn create_file_store() -> Result<(TempDir, SqlitePlayerStore)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("data").join("players.db");
    let pool = init_database_pool(&db_path).await?;
    Ok((temp_dir, SqlitePlayerStore::new(pool)))
}

/// Write `players` through the regular upsert path
pub async fn seed_players(store: &SqlitePlayerStore, players: &[PlayerRecord]) -> Result<()> {
    store.persist(players).await?;
    Ok(())
}
