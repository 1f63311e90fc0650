//! Sound record operations
//!
//! Rows are created by the external catalog ingestion process (or test
//! seeding via [`insert_sound`]); this module mutates them on behalf of the
//! claim queue and the result ingestor. Every status write that leaves a
//! terminal or re-eligible state clears both lease fields together.

use crate::db::now_ms;
use crate::types::FetchStatus;
use crate::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Catalog item pointing at one downloadable audio clip
#[derive(Debug, Clone)]
pub struct SoundRecord {
    pub guid: Uuid,
    /// External source identifier, doubles as the staged file stem
    pub source_id: String,
    /// Download URL
    pub locator: String,
    pub popularity: i64,
    pub fetch_status: FetchStatus,
    pub fetch_tries: i64,
    pub last_checked_no_result: Option<i64>,
    pub lease_owner: Option<String>,
    pub lease_started_at: Option<i64>,
    pub resolved_entity_id: Option<Uuid>,
    pub last_error: Option<String>,
}

impl SoundRecord {
    pub fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        let guid: String = row.get("guid");
        let resolved: Option<String> = row.get("resolved_entity_id");
        let status: i64 = row.get("fetch_status");

        Ok(Self {
            guid: Uuid::parse_str(&guid)
                .map_err(|e| Error::Internal(format!("bad sound guid {guid}: {e}")))?,
            source_id: row.get("source_id"),
            locator: row.get("locator"),
            popularity: row.get("popularity"),
            fetch_status: FetchStatus::from_i64(status)
                .ok_or_else(|| Error::Internal(format!("bad fetch_status {status}")))?,
            fetch_tries: row.get("fetch_tries"),
            last_checked_no_result: row.get("last_checked_no_result"),
            lease_owner: row.get("lease_owner"),
            lease_started_at: row.get("lease_started_at"),
            resolved_entity_id: resolved
                .map(|s| {
                    Uuid::parse_str(&s)
                        .map_err(|e| Error::Internal(format!("bad entity guid {s}: {e}")))
                })
                .transpose()?,
            last_error: row.get("last_error"),
        })
    }
}

pub const SOUND_COLUMNS: &str = "guid, source_id, locator, popularity, fetch_status, fetch_tries, \
     last_checked_no_result, lease_owner, lease_started_at, resolved_entity_id, last_error";

/// Insert a new catalog row. Used by catalog seeding and tests.
pub async fn insert_sound(
    pool: &SqlitePool,
    source_id: &str,
    locator: &str,
    popularity: i64,
) -> Result<Uuid> {
    let guid = Uuid::new_v4();
    let now = now_ms();

    sqlx::query(
        r#"
        INSERT INTO sound_records (guid, source_id, locator, popularity, fetch_status,
                                   fetch_tries, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(source_id)
    .bind(locator)
    .bind(popularity)
    .bind(FetchStatus::NotFetched.as_i64())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(guid)
}

pub async fn get_by_source_id(pool: &SqlitePool, source_id: &str) -> Result<Option<SoundRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {SOUND_COLUMNS} FROM sound_records WHERE source_id = ?"
    ))
    .bind(source_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| SoundRecord::from_row(&r)).transpose()
}

pub async fn get_by_guid(pool: &SqlitePool, guid: Uuid) -> Result<Option<SoundRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {SOUND_COLUMNS} FROM sound_records WHERE guid = ?"
    ))
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| SoundRecord::from_row(&r)).transpose()
}

/// Store a service error on the row and return it to the eligible pool
pub async fn store_error(conn: &mut SqliteConnection, guid: Uuid, message: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sound_records
        SET last_error = ?, fetch_status = ?, lease_owner = NULL, lease_started_at = NULL,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(message)
    .bind(FetchStatus::NotFetched.as_i64())
    .bind(now_ms())
    .bind(guid.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

/// Record a soft failure: the payload lacked required identity fields.
///
/// `fetch_tries` always increments; the no-result timestamp is bumped unless
/// the updated count lands on a multiple of 3, which throttles the re-check
/// cadence while the counter keeps growing. Computed in one statement so
/// concurrent ingestors cannot interleave between read and write.
pub async fn record_soft_failure(conn: &mut SqliteConnection, guid: Uuid, now: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sound_records
        SET last_checked_no_result = CASE WHEN (fetch_tries + 1) % 3 = 0
                                          THEN last_checked_no_result
                                          ELSE ? END,
            fetch_tries = fetch_tries + 1,
            fetch_status = ?,
            lease_owner = NULL,
            lease_started_at = NULL,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(now)
    .bind(FetchStatus::NotFetched.as_i64())
    .bind(now)
    .bind(guid.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

/// Terminal: payload content matched a blocked keyword
pub async fn mark_blocked(conn: &mut SqliteConnection, guid: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sound_records
        SET fetch_status = ?, lease_owner = NULL, lease_started_at = NULL, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(FetchStatus::Blocked.as_i64())
    .bind(now_ms())
    .bind(guid.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

/// Terminal: the row now points at its recognized entity
pub async fn mark_processed(
    conn: &mut SqliteConnection,
    guid: Uuid,
    entity_guid: Uuid,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE sound_records
        SET resolved_entity_id = ?, fetch_status = ?, last_error = NULL,
            lease_owner = NULL, lease_started_at = NULL, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(entity_guid.to_string())
    .bind(FetchStatus::Processed.as_i64())
    .bind(now_ms())
    .bind(guid.to_string())
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_pool() -> SqlitePool {
        db::init_pool("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_load_sound() {
        let pool = test_pool().await;

        let guid = insert_sound(&pool, "7351481446513445664", "https://cdn.example/a.mp3", 120)
            .await
            .unwrap();

        let loaded = get_by_source_id(&pool, "7351481446513445664")
            .await
            .unwrap()
            .expect("row present");

        assert_eq!(loaded.guid, guid);
        assert_eq!(loaded.popularity, 120);
        assert_eq!(loaded.fetch_status, FetchStatus::NotFetched);
        assert_eq!(loaded.fetch_tries, 0);
        assert!(loaded.lease_owner.is_none());
    }

    #[tokio::test]
    async fn test_soft_failure_skips_timestamp_on_every_third_try() {
        let pool = test_pool().await;
        let guid = insert_sound(&pool, "s1", "https://cdn.example/s1.mp3", 1)
            .await
            .unwrap();

        for (attempt, now) in [(1i64, 1000i64), (2, 2000), (3, 3000), (4, 4000)] {
            {
                let mut conn = pool.acquire().await.unwrap();
                record_soft_failure(&mut conn, guid, now).await.unwrap();
            }
            let row = get_by_guid(&pool, guid).await.unwrap().unwrap();
            assert_eq!(row.fetch_tries, attempt);

            let expected_ts = match attempt {
                1 => Some(1000),
                2 => Some(2000),
                3 => Some(2000), // third try: counter moves, timestamp does not
                4 => Some(4000),
                _ => unreachable!(),
            };
            assert_eq!(row.last_checked_no_result, expected_ts);
        }
    }
}
