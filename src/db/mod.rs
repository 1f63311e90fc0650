//! Database access for the sounddex catalog

pub mod claim;
pub mod entities;
pub mod labels;
pub mod schema;
pub mod sounds;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Current wall-clock time as Unix milliseconds, the store's timestamp unit
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Initialize the database connection pool and bootstrap the schema.
///
/// WAL mode plus a busy timeout lets concurrent workers serialize on the
/// single writer; the claim statement's atomicity depends on it.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    // A pooled in-memory database would give every connection its own
    // empty database; pin those to a single connection.
    let is_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let pool = SqlitePoolOptions::new()
        .max_connections(if is_memory { 1 } else { 5 })
        .connect_with(options)
        .await?;

    schema::init_schema(&pool).await?;

    tracing::debug!(url = database_url, "Database connection established");

    Ok(pool)
}
