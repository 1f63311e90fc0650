//! Recognition phase
//!
//! Walks the download directory, runs each staged clip through the engine,
//! appends the result to the spool, and removes the clip. Results are
//! spooled per item so a crash mid-batch keeps everything already earned.

use crate::services::recognizer::{CallBudget, RecognitionEngine, RecognitionService};
use crate::workflow::spool::{ResultSpool, SpoolEntry};
use crate::Result;
use std::path::Path;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg", "flac", "aac"];

pub async fn recognize_staged<S: RecognitionService>(
    download_dir: &Path,
    engine: &RecognitionEngine<S>,
    budget: &mut CallBudget,
    spool: &ResultSpool,
) -> Result<u64> {
    let mut processed = 0u64;

    for entry in WalkDir::new(download_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }

        tracing::info!(path = %path.display(), "Recognizing clip");
        let payload = engine.recognize_file(path, budget).await;

        spool.append(SpoolEntry {
            source_locator: path.to_string_lossy().to_string(),
            payload,
        })?;

        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged clip");
        }

        processed += 1;
    }

    tracing::info!(processed, "Recognition phase finished");

    Ok(processed)
}
