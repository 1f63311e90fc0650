//! Label records and the batch-scoped label cache
//!
//! Labels are created on first sighting of a name. The cache is seeded once
//! per ingest batch from the full table; misses insert with
//! `ON CONFLICT DO NOTHING` and fall back to a lookup, so a concurrent
//! ingestor inserting the same name never fails the batch.

use crate::db::now_ms;
use crate::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Label {
    pub guid: Uuid,
    pub name: String,
    pub created_at: i64,
}

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Label>> {
    let rows = sqlx::query("SELECT guid, name, created_at FROM labels")
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let guid: String = row.get("guid");
            Ok(Label {
                guid: Uuid::parse_str(&guid)
                    .map_err(|e| Error::Internal(format!("bad label guid {guid}: {e}")))?,
                name: row.get("name"),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}

/// Insert a label, tolerating a concurrent insert of the same name, and
/// return the winning row's guid.
pub async fn insert_or_fetch(conn: &mut SqliteConnection, name: &str) -> Result<Uuid> {
    sqlx::query("INSERT INTO labels (guid, name, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(now_ms())
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query("SELECT guid FROM labels WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    let guid: String = row.get("guid");
    Uuid::parse_str(&guid).map_err(|e| Error::Internal(format!("bad label guid {guid}: {e}")))
}

/// Batch-scoped name → guid arena
pub struct LabelCache {
    inner: Mutex<HashMap<String, Uuid>>,
}

impl LabelCache {
    /// Seed from the full label table at batch start
    pub async fn seed(pool: &SqlitePool) -> Result<Self> {
        let map = load_all(pool)
            .await?
            .into_iter()
            .map(|label| (label.name, label.guid))
            .collect::<HashMap<_, _>>();

        tracing::debug!(labels = map.len(), "Label cache seeded");

        Ok(Self {
            inner: Mutex::new(map),
        })
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a name to a label guid, inserting if absent
    pub async fn resolve(&self, conn: &mut SqliteConnection, name: &str) -> Result<Uuid> {
        if let Some(guid) = self.inner.lock().expect("label cache poisoned").get(name) {
            return Ok(*guid);
        }

        let guid = insert_or_fetch(conn, name).await?;
        self.inner
            .lock()
            .expect("label cache poisoned")
            .insert(name.to_string(), guid);

        Ok(guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_insert_or_fetch_is_conflict_tolerant() {
        let pool = db::init_pool("sqlite::memory:").await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = insert_or_fetch(&mut conn, "Test Records").await.unwrap();
        // Same name again: no new row, same guid
        let second = insert_or_fetch(&mut conn, "Test Records").await.unwrap();
        assert_eq!(first, second);
        drop(conn);

        let labels = load_all(&pool).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "Test Records");
    }

    #[tokio::test]
    async fn test_cache_falls_back_to_lookup_on_unseen_existing_row() {
        let pool = db::init_pool("sqlite::memory:").await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        // Row exists in the table but not in this batch's cache, as when a
        // sibling ingestor inserted it after our seed.
        let existing = insert_or_fetch(&mut conn, "Late Arrival").await.unwrap();

        let cache = LabelCache::empty();
        let resolved = cache.resolve(&mut conn, "Late Arrival").await.unwrap();
        assert_eq!(resolved, existing);
        drop(conn);

        assert_eq!(load_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_seeds_from_table() {
        let pool = db::init_pool("sqlite::memory:").await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let guid = insert_or_fetch(&mut conn, "Seeded").await.unwrap();
        drop(conn);

        let cache = LabelCache::seed(&pool).await.unwrap();

        // A resolve against a fresh connection should hit the cache
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(cache.resolve(&mut conn, "Seeded").await.unwrap(), guid);
    }
}
