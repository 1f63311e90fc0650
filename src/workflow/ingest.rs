//! Result ingestion
//!
//! Converts buffered recognition payloads into catalog mutations: one
//! transaction per item, retried on store contention, with per-item failures
//! isolated so the batch always runs to completion.

use crate::config::IngestSettings;
use crate::db::labels::LabelCache;
use crate::db::sounds::{self, SoundRecord};
use crate::db::{entities, now_ms};
use crate::types::RecognitionPayload;
use crate::utils::backoff::{retry_with, BackoffPolicy};
use crate::workflow::spool::SpoolEntry;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// What one item's ingestion did to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Entity resolved, row marked PROCESSED
    Processed,
    /// Payload content matched a blocked keyword
    Blocked,
    /// Required identity fields missing; re-check throttled
    SoftFailure,
    /// Service error stored on the row, row re-eligible
    ErrorStored,
}

/// Aggregate batch counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u64,
    pub blocked: u64,
    pub soft_failures: u64,
    pub errors_stored: u64,
    pub failed: u64,
}

impl BatchReport {
    fn tally(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Processed => self.processed += 1,
            IngestOutcome::Blocked => self.blocked += 1,
            IngestOutcome::SoftFailure => self.soft_failures += 1,
            IngestOutcome::ErrorStored => self.errors_stored += 1,
        }
    }
}

/// Ingest a batch of spool entries sequentially.
///
/// The label cache is seeded once per batch; one item's failure never rolls
/// back or blocks its siblings.
pub async fn ingest_batch(
    pool: &SqlitePool,
    entries: &[SpoolEntry],
    settings: &IngestSettings,
) -> Result<BatchReport> {
    let cache = LabelCache::seed(pool).await?;
    let mut report = BatchReport::default();

    for entry in entries {
        match ingest_entry(pool, entry, &cache, settings).await {
            Ok(outcome) => report.tally(outcome),
            Err(e) => {
                tracing::error!(
                    source_locator = %entry.source_locator,
                    error = %e,
                    "Failed to ingest recognition result"
                );
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        blocked = report.blocked,
        soft_failures = report.soft_failures,
        errors_stored = report.errors_stored,
        failed = report.failed,
        "Ingest batch finished"
    );

    Ok(report)
}

/// Ingest one entry inside a retryable transaction
pub async fn ingest_entry(
    pool: &SqlitePool,
    entry: &SpoolEntry,
    cache: &LabelCache,
    settings: &IngestSettings,
) -> Result<IngestOutcome> {
    let source_id = source_id_from_locator(&entry.source_locator).ok_or_else(|| {
        Error::Internal(format!("no source id in locator {}", entry.source_locator))
    })?;

    let sound = sounds::get_by_source_id(pool, &source_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("sound record {source_id}")))?;

    let policy = BackoffPolicy::exponential(
        settings.txn_max_attempts,
        Duration::from_millis(settings.txn_backoff_base_ms),
    );

    let sound_ref = &sound;
    let payload_ref = &entry.payload;
    retry_with(&policy, "result ingest", Error::is_contention, || async move {
        let mut tx = pool.begin().await?;
        let outcome = apply_payload(&mut tx, sound_ref, payload_ref, cache, settings).await?;
        tx.commit().await?;
        Ok(outcome)
    })
    .await
}

/// The staged file's stem is the catalog source id
fn source_id_from_locator(locator: &str) -> Option<String> {
    Path::new(locator)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.to_string())
}

async fn apply_payload(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    sound: &SoundRecord,
    payload: &RecognitionPayload,
    cache: &LabelCache,
    settings: &IngestSettings,
) -> Result<IngestOutcome> {
    // Explicit service error: store it and return the row to the pool
    if let Some(error) = &payload.error {
        sounds::store_error(&mut *tx, sound.guid, error).await?;
        tracing::warn!(source_id = %sound.source_id, error = %error, "Recognition error stored");
        return Ok(IngestOutcome::ErrorStored);
    }

    // Identity must be complete before anything is created
    let identity = payload
        .track
        .as_ref()
        .and_then(|track| track.identity(&settings.playable_host_prefix));
    let Some(identity) = identity else {
        sounds::record_soft_failure(&mut *tx, sound.guid, now_ms()).await?;
        tracing::info!(source_id = %sound.source_id, "Payload lacks identity fields, soft failure");
        return Ok(IngestOutcome::SoftFailure);
    };

    // Content blocking runs against the serialized payload text so it also
    // catches keywords buried in nested metadata
    let serialized = serde_json::to_string(payload)
        .map_err(|e| Error::Internal(format!("serialize payload failed: {e}")))?;
    if let Some(keyword) = settings
        .blocked_keywords
        .iter()
        .find(|keyword| serialized.contains(keyword.as_str()))
    {
        sounds::mark_blocked(&mut *tx, sound.guid).await?;
        tracing::warn!(source_id = %sound.source_id, keyword = %keyword, "Payload blocked");
        return Ok(IngestOutcome::Blocked);
    }

    let label_id = match payload.track.as_ref().and_then(|track| track.label_name()) {
        Some(name) => Some(cache.resolve(&mut *tx, &name).await?),
        None => None,
    };

    let entity_guid = entities::upsert(&mut *tx, &identity, label_id).await?;
    sounds::mark_processed(&mut *tx, sound.guid, entity_guid).await?;

    tracing::info!(
        source_id = %sound.source_id,
        recognition_id = %identity.recognition_id,
        display_name = %identity.display_name,
        "Sound resolved"
    );

    Ok(IngestOutcome::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_from_locator() {
        assert_eq!(
            source_id_from_locator("sounds/7351481446513445664.mp3").as_deref(),
            Some("7351481446513445664")
        );
        assert_eq!(
            source_id_from_locator("/abs/path/42.wav").as_deref(),
            Some("42")
        );
        assert_eq!(source_id_from_locator(""), None);
    }
}
