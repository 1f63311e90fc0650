//! Audio clip download
//!
//! Fetches a claimed record's locator and stages the bytes in the download
//! directory as `{source_id}.{ext}`, taking the extension from the URL when
//! it has one and sniffing the bytes otherwise.

use crate::db::sounds::SoundRecord;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = "sounddex/0.1.0 (https://github.com/sounddex/sounddex)";

pub struct Downloader {
    http_client: reqwest::Client,
    download_dir: PathBuf,
}

impl Downloader {
    pub fn new(download_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(download_dir)?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            download_dir: download_dir.to_path_buf(),
        })
    }

    /// Download one clip; returns the staged file path.
    pub async fn fetch(&self, record: &SoundRecord) -> Result<PathBuf> {
        let response = self
            .http_client
            .get(&record.locator)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "download failed with status {status} for {}",
                record.locator
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let extension = locator_extension(&record.locator)
            .or_else(|| infer::get(&bytes).map(|kind| kind.extension().to_string()))
            .unwrap_or_else(|| "bin".to_string());

        let path = self
            .download_dir
            .join(format!("{}.{}", record.source_id, extension));
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(
            locator = %record.locator,
            path = %path.display(),
            bytes = bytes.len(),
            "Downloaded clip"
        );

        Ok(path)
    }
}

/// File extension from the locator's final path segment, if it has one
fn locator_extension(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 4 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
