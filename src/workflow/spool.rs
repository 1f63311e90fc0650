//! Intermediate result spool
//!
//! An ordered JSON file of `{source_locator, payload}` entries. The
//! recognition phase appends one entry per processed item as it goes, so a
//! crash loses at most the in-flight item; the ingest phase consumes the
//! whole set and clears it.

use crate::types::RecognitionPayload;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolEntry {
    /// Staged file path; its stem is the catalog source id
    pub source_locator: String,
    pub payload: RecognitionPayload,
}

pub struct ResultSpool {
    path: PathBuf,
}

impl ResultSpool {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Reset the spool to an empty list
    pub fn clear(&self) -> Result<()> {
        std::fs::write(&self.path, "[]")?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<SpoolEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Internal(format!("corrupt spool {}: {e}", self.path.display())))
    }

    /// Append one entry, rewriting the file so it stays valid JSON
    pub fn append(&self, entry: SpoolEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::Internal(format!("serialize spool failed: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Consume the spool: return all entries and clear the file
    pub fn take(&self) -> Result<Vec<SpoolEntry>> {
        let entries = self.load()?;
        self.clear()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_load_take_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ResultSpool::new(&dir.path().join("results.json"));

        // Missing file reads as empty
        assert!(spool.load().unwrap().is_empty());

        spool.clear().unwrap();
        spool
            .append(SpoolEntry {
                source_locator: "sounds/111.mp3".to_string(),
                payload: RecognitionPayload::from_error("timeout"),
            })
            .unwrap();
        spool
            .append(SpoolEntry {
                source_locator: "sounds/222.mp3".to_string(),
                payload: RecognitionPayload::insufficient_data(),
            })
            .unwrap();

        let entries = spool.take().unwrap();
        assert_eq!(entries.len(), 2);
        // Order of production is preserved
        assert_eq!(entries[0].source_locator, "sounds/111.mp3");
        assert_eq!(entries[0].payload.error.as_deref(), Some("timeout"));

        // Consumed: the spool is empty again
        assert!(spool.load().unwrap().is_empty());
    }
}
