//! Work leasing over the sound catalog
//!
//! Claims are a single `UPDATE ... WHERE guid IN (SELECT ...) RETURNING`
//! statement: eligibility selection and the IN_PROGRESS/owner stamp happen
//! atomically, so two workers claiming concurrently can never receive the
//! same row. There is no external lock manager; SQLite's single-writer
//! transaction semantics carry the exclusion.

use crate::config::ClaimSettings;
use crate::db::now_ms;
use crate::db::sounds::{SoundRecord, SOUND_COLUMNS};
use crate::types::FetchStatus;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct ClaimQueue {
    pool: SqlitePool,
    settings: ClaimSettings,
}

impl ClaimQueue {
    pub fn new(pool: SqlitePool, settings: ClaimSettings) -> Self {
        Self { pool, settings }
    }

    /// Recover rows whose worker died mid-processing: any lease older than
    /// the configured max age is cleared and the row reset to NOT_FETCHED.
    /// Runs before every claim. Returns the number of reclaimed rows.
    pub async fn sweep_expired_leases(&self) -> Result<u64> {
        let cutoff = now_ms() - self.settings.lease_max_age().as_millis() as i64;

        let result = sqlx::query(
            r#"
            UPDATE sound_records
            SET fetch_status = ?, lease_owner = NULL, lease_started_at = NULL, updated_at = ?
            WHERE lease_started_at IS NOT NULL AND lease_started_at <= ?
            "#,
        )
        .bind(FetchStatus::NotFetched.as_i64())
        .bind(now_ms())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            tracing::info!(reclaimed, "Expired leases swept back to eligible pool");
        }

        Ok(reclaimed)
    }

    /// Claim up to `batch_size` eligible rows for `owner`.
    ///
    /// Eligible: NOT_FETCHED, never resolved, unleased, above the popularity
    /// floor, locator outside the denylist, and either never checked or past
    /// the re-check cooldown. Richest items first.
    pub async fn claim_batch(&self, owner: &str) -> Result<Vec<SoundRecord>> {
        let now = now_ms();
        let recheck_cutoff = now - self.settings.recheck_cooldown_days * 86_400_000;

        let mut sql = format!(
            r#"
            UPDATE sound_records
            SET fetch_status = ?, lease_owner = ?, lease_started_at = ?, updated_at = ?
            WHERE guid IN (
                SELECT guid FROM sound_records
                WHERE fetch_status = ?
                  AND resolved_entity_id IS NULL
                  AND lease_owner IS NULL
                  AND popularity >= ?
                  AND (last_checked_no_result IS NULL OR last_checked_no_result <= ?)
            "#
        );
        for _ in &self.settings.locator_denylist {
            sql.push_str("      AND locator NOT LIKE ?\n");
        }
        sql.push_str(
            r#"
                ORDER BY popularity DESC
                LIMIT ?
            )
            RETURNING "#,
        );
        sql.push_str(SOUND_COLUMNS);

        let mut query = sqlx::query(&sql)
            .bind(FetchStatus::InProgress.as_i64())
            .bind(owner)
            .bind(now)
            .bind(now)
            .bind(FetchStatus::NotFetched.as_i64())
            .bind(self.settings.min_popularity)
            .bind(recheck_cutoff);
        for pattern in &self.settings.locator_denylist {
            query = query.bind(pattern);
        }
        query = query.bind(self.settings.batch_size);

        let rows = query.fetch_all(&self.pool).await?;

        let mut claimed = rows
            .iter()
            .map(SoundRecord::from_row)
            .collect::<Result<Vec<_>>>()?;

        // RETURNING does not preserve the subquery's ordering
        claimed.sort_by(|a, b| b.popularity.cmp(&a.popularity));

        tracing::info!(owner, claimed = claimed.len(), "Claimed batch");

        Ok(claimed)
    }

    /// Reconcile a download attempt. Success keeps the lease and advances to
    /// DOWNLOADED; failure returns the row to the pool immediately rather
    /// than waiting for the lease sweep.
    pub async fn report_download_outcome(&self, guid: Uuid, success: bool) -> Result<()> {
        if success {
            sqlx::query("UPDATE sound_records SET fetch_status = ?, updated_at = ? WHERE guid = ?")
                .bind(FetchStatus::Downloaded.as_i64())
                .bind(now_ms())
                .bind(guid.to_string())
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE sound_records
                SET fetch_status = ?, lease_owner = NULL, lease_started_at = NULL, updated_at = ?
                WHERE guid = ?
                "#,
            )
            .bind(FetchStatus::NotFetched.as_i64())
            .bind(now_ms())
            .bind(guid.to_string())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}
