//! SQLite player store tests
//!
//! Stale ordering, bulk upsert semantics and stub registration against a
//! real SQLite database.

mod helpers;

use chrono::{DateTime, Duration, TimeZone, Utc};
use helpers::{create_file_store, create_memory_store, seed_players};
use players_service::models::PlayerRecord;
use players_service::db::SqlitePlayerStore;
use players_service::services::{select_stale, SourceOfTruth};
use players_service::PlayersError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

fn updated(steam_id: i64, last_update: Option<DateTime<Utc>>) -> PlayerRecord {
    PlayerRecord {
        steam_id,
        name: Some(format!("name-{}", steam_id)),
        avatar: None,
        exists: last_update.map(|_| true),
        last_update,
    }
}

#[tokio::test]
async fn test_stale_order_never_updated_first_then_oldest() {
    let store = create_memory_store().await.unwrap();
    seed_players(
        &store,
        &[
            updated(5, Some(at(10))),
            updated(4, None),
            updated(3, Some(at(8))),
            updated(2, None),
            updated(1, Some(at(10))),
        ],
    )
    .await
    .unwrap();

    let ids: Vec<_> = store
        .select_stale(10)
        .await
        .unwrap()
        .iter()
        .map(|p| p.steam_id)
        .collect();

    // nulls first (by id), then ascending last_update, ties by id
    assert_eq!(ids, vec![2, 4, 3, 1, 5]);
}

#[tokio::test]
async fn test_stale_selection_respects_limit() {
    let store = create_memory_store().await.unwrap();
    let players: Vec<_> = (1..=20).map(PlayerRecord::new).collect();
    seed_players(&store, &players).await.unwrap();

    let selected = select_stale(&store, 7).await.unwrap();

    assert_eq!(selected.len(), 7);
    assert_eq!(selected[0].steam_id, 1);
}

#[tokio::test]
async fn test_stale_selection_rejects_non_positive_limits() {
    let store = create_memory_store().await.unwrap();

    for limit in [0, -1] {
        assert!(matches!(
            select_stale(&store, limit).await,
            Err(PlayersError::InvalidArgument(_))
        ));
    }
}

#[tokio::test]
async fn test_persist_empty_returns_zero() {
    let store = create_memory_store().await.unwrap();

    assert_eq!(store.persist(&[]).await.unwrap(), 0);
    assert_eq!(store.count_players().await.unwrap(), 0);
}

#[tokio::test]
async fn test_persist_inserts_then_updates() {
    let store = create_memory_store().await.unwrap();
    store.persist(&[PlayerRecord::new(42)]).await.unwrap();

    let reconciled = PlayerRecord {
        steam_id: 42,
        name: Some("Gordon".into()),
        avatar: Some("https://example.org/42.jpg".into()),
        exists: Some(true),
        last_update: Some(at(12)),
    };
    store.persist(std::slice::from_ref(&reconciled)).await.unwrap();

    assert_eq!(store.get_player(42).await.unwrap(), Some(reconciled));
    assert_eq!(store.count_players().await.unwrap(), 1);
}

#[tokio::test]
async fn test_identical_upserts_are_idempotent() {
    let store = create_memory_store().await.unwrap();
    let players = vec![
        updated(1, Some(at(1))),
        PlayerRecord {
            exists: Some(false),
            last_update: Some(at(2)),
            ..PlayerRecord::new(2)
        },
    ];

    store.persist(&players).await.unwrap();
    let first = store.select_stale(10).await.unwrap();
    store.persist(&players).await.unwrap();
    let second = store.select_stale(10).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, players);
}

#[tokio::test]
async fn test_persist_spans_multiple_statements() {
    let store = create_memory_store().await.unwrap();
    let players: Vec<_> = (1..=250)
        .map(|id| updated(id, Some(at(3))))
        .collect();

    let rows = store.persist(&players).await.unwrap();

    assert_eq!(rows, 250);
    assert_eq!(store.count_players().await.unwrap(), 250);
}

#[tokio::test]
async fn test_subsecond_timestamps_keep_their_order() {
    let store = create_memory_store().await.unwrap();
    let base = at(6);
    seed_players(
        &store,
        &[
            updated(1, Some(base + Duration::milliseconds(900))),
            updated(2, Some(base + Duration::milliseconds(50))),
            updated(3, Some(base)),
        ],
    )
    .await
    .unwrap();

    let ids: Vec<_> = store
        .select_stale(3)
        .await
        .unwrap()
        .iter()
        .map(|p| p.steam_id)
        .collect();

    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_add_players_inserts_stubs_once() {
    let store = create_memory_store().await.unwrap();
    store.persist(&[updated(7, Some(at(9)))]).await.unwrap();

    let inserted = store.add_players(&[7, 8, 9, 9]).await.unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(store.get_player(8).await.unwrap(), Some(PlayerRecord::new(8)));
    // existing row untouched
    assert_eq!(
        store.get_player(7).await.unwrap().unwrap().last_update,
        Some(at(9))
    );
}

#[tokio::test]
async fn test_file_database_created_with_schema() {
    let (temp_dir, store) = create_file_store().await.unwrap();

    assert!(temp_dir.path().join("data").join("players.db").exists());
    store.add_players(&[1]).await.unwrap();
    assert_eq!(store.count_players().await.unwrap(), 1);
}

#[tokio::test]
async fn test_write_lock_conflict_is_transient() {
    let (temp_dir, store) = create_file_store().await.unwrap();
    let db_path = temp_dir.path().join("data").join("players.db");

    // Second writer gives up at once instead of waiting on the busy handler
    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .busy_timeout(std::time::Duration::ZERO);
    let contender = SqlitePlayerStore::new(
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap(),
    );

    let mut holder = store.pool().acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *holder)
        .await
        .unwrap();

    let err = contender
        .persist(&[updated(1, Some(at(4)))])
        .await
        .unwrap_err();
    assert!(
        matches!(err, PlayersError::Persistence { transient: true, .. }),
        "expected transient persistence error, got {:?}",
        err
    );
    assert!(err.is_transient());

    sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
    drop(holder);

    assert_eq!(contender.persist(&[updated(1, Some(at(4)))]).await.unwrap(), 1);
    assert_eq!(store.count_players().await.unwrap(), 1);
}
