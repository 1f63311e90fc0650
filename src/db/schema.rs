//! Catalog schema bootstrap
//!
//! Creates the three catalog tables if absent. All timestamps are integer
//! Unix milliseconds; status values are the persisted integers of
//! `FetchStatus`.

use crate::Result;
use sqlx::SqlitePool;

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labels (
            guid TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recognized_entities (
            guid TEXT PRIMARY KEY,
            recognition_id TEXT UNIQUE NOT NULL,
            display_name TEXT NOT NULL,
            image_url TEXT,
            share_url TEXT,
            play_url TEXT,
            label_id TEXT REFERENCES labels(guid),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sound_records (
            guid TEXT PRIMARY KEY,
            source_id TEXT UNIQUE NOT NULL,
            locator TEXT NOT NULL,
            popularity INTEGER NOT NULL DEFAULT 0,
            fetch_status INTEGER NOT NULL DEFAULT 0,
            fetch_tries INTEGER NOT NULL DEFAULT 0,
            last_checked_no_result INTEGER,
            lease_owner TEXT,
            lease_started_at INTEGER,
            resolved_entity_id TEXT REFERENCES recognized_entities(guid),
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Claim scans filter on status then order by popularity
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sound_records_claim
        ON sound_records (fetch_status, popularity DESC)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (labels, recognized_entities, sound_records)");

    Ok(())
}
