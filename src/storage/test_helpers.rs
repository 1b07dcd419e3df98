//! Shared test helpers for storage module tests.

#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use sqlx::sqlite::SqlitePoolOptions;
#[cfg(test)]
use sqlx::SqlitePool;

#[cfg(test)]
use crate::storage::{run_migrations, StateStore};
#[cfg(test)]
use crate::time_utils::{parse_timestamp, ManualClock};

/// Creates an in-memory database with migrations applied.
///
/// One connection only: every `sqlite::memory:` connection is its own database.
#[cfg(test)]
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// A store over a fresh database whose clock starts at 2024-03-01 12:00 UTC+4.
#[cfg(test)]
pub async fn create_test_store() -> (StateStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        parse_timestamp("2024-03-01T12:00:00+04:00").expect("valid timestamp"),
    ));
    let store = StateStore::new(create_test_pool().await, clock.clone());
    (store, clock)
}

/// Number of incidents of `site_id` that have not ended.
#[cfg(test)]
pub async fn count_open_incidents(pool: &SqlitePool, site_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM incidents WHERE site_id = ? AND ended_at IS NULL")
        .bind(site_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count open incidents")
}
