//! Player table operations

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{PlayersError, PlayersResult};
use crate::models::{PlayerRecord, SteamId};
use crate::services::traits::SourceOfTruth;

/// Rows per upsert statement (5 binds each, stays under SQLite's 999 variable limit)
const UPSERT_CHUNK_SIZE: usize = 100;

/// `SourceOfTruth` backed by the SQLite `players` table
#[derive(Debug, Clone)]
pub struct SqlitePlayerStore {
    pool: SqlitePool,
}

impl SqlitePlayerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register Steam IDs as stub rows, ignoring ids already present
    ///
    /// # Returns
    /// Number of ids actually inserted.
    pub async fn add_players(&self, ids: &[SteamId]) -> PlayersResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in ids.chunks(UPSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO players (steam_id) ");
            builder.push_values(chunk, |mut row, steam_id| {
                row.push_bind(*steam_id);
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(requested = ids.len(), inserted, "Registered players");
        Ok(inserted)
    }

    /// Load one player
    pub async fn get_player(&self, steam_id: SteamId) -> PlayersResult<Option<PlayerRecord>> {
        let row = sqlx::query(
            "SELECT steam_id, name, avatar, player_exists, last_update FROM players WHERE steam_id = ?",
        )
        .bind(steam_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| player_from_row(&row)).transpose()
    }

    pub async fn count_players(&self) -> PlayersResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SourceOfTruth for SqlitePlayerStore {
    async fn select_stale(&self, limit: i64) -> PlayersResult<Vec<PlayerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT steam_id, name, avatar, player_exists, last_update
            FROM players
            ORDER BY last_update IS NOT NULL, last_update ASC, steam_id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(player_from_row).collect()
    }

    async fn persist(&self, players: &[PlayerRecord]) -> PlayersResult<u64> {
        if players.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut rows_affected = 0;

        for chunk in players.chunks(UPSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO players (steam_id, name, avatar, player_exists, last_update) ",
            );
            builder.push_values(chunk, |mut row, player| {
                row.push_bind(player.steam_id)
                    .push_bind(player.name.as_deref())
                    .push_bind(player.avatar.as_deref())
                    .push_bind(player.exists)
                    .push_bind(player.last_update.map(format_timestamp));
            });
            builder.push(
                " ON CONFLICT(steam_id) DO UPDATE SET \
                 name = excluded.name, \
                 avatar = excluded.avatar, \
                 player_exists = excluded.player_exists, \
                 last_update = excluded.last_update",
            );

            rows_affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(rows_affected)
    }
}

/// Fixed-width RFC 3339 (microseconds, `Z`) so TEXT ordering matches time ordering
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> PlayersResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PlayersError::Persistence {
            transient: false,
            message: format!("Failed to parse last_update {:?}: {}", value, e),
        })
}

fn player_from_row(row: &sqlx::sqlite::SqliteRow) -> PlayersResult<PlayerRecord> {
    let last_update: Option<String> = row.try_get("last_update")?;

    Ok(PlayerRecord {
        steam_id: row.try_get("steam_id")?,
        name: row.try_get("name")?,
        avatar: row.try_get("avatar")?,
        exists: row.try_get("player_exists")?,
        last_update: last_update.as_deref().map(parse_timestamp).transpose()?,
    })
}
