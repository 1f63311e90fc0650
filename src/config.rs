//! Configuration for the sounddex worker
//!
//! Resolution priority: CLI argument > environment variable > TOML file >
//! compiled default. Only the values commonly varied per deployment carry
//! environment overrides.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Worker configuration, deserialized from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database URL, e.g. `sqlite://sounddex.db`
    pub database_url: String,
    /// Directory downloaded clips are staged in
    pub download_dir: PathBuf,
    /// JSON spool file holding recognition results between phases
    pub spool_path: PathBuf,
    pub claim: ClaimSettings,
    pub pacing: PacingSettings,
    pub scan: ScanSettings,
    pub ingest: IngestSettings,
    pub service: ServiceSettings,
}

/// ClaimQueue eligibility and lease parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClaimSettings {
    /// Maximum rows claimed per batch
    pub batch_size: u32,
    /// Leases older than this are swept back to the eligible pool
    pub lease_max_age_minutes: u64,
    /// Popularity floor; rows below it are never claimed
    pub min_popularity: i64,
    /// SQL LIKE patterns; locators matching any are skipped
    pub locator_denylist: Vec<String>,
    /// Days a no-result item rests before re-checking
    pub recheck_cooldown_days: i64,
}

/// Local outbound-call pacing for the recognition service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Calls issued before a proactive cooldown sleep
    pub call_ceiling: u32,
    /// Cooldown slept at the ceiling or on a service rate-limit signal
    pub cooldown_seconds: u64,
}

/// Audio windowing parameters for signature generation
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Seconds of audio per signature window
    pub window_seconds: u32,
    /// Leading seconds removed by the final fallback strategy
    pub lead_trim_seconds: u32,
}

/// ResultIngestor parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Keywords that mark a payload's content as blocked
    pub blocked_keywords: Vec<String>,
    /// Host prefix identifying playable-media URIs in hub actions
    pub playable_host_prefix: String,
    /// Transaction retry ceiling on store contention
    pub txn_max_attempts: u32,
    /// Base delay of the exponential transaction backoff
    pub txn_backoff_base_ms: u64,
}

/// External recognition service endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sounddex.db".to_string(),
            download_dir: PathBuf::from("sounds"),
            spool_path: PathBuf::from("recognition_results.json"),
            claim: ClaimSettings::default(),
            pacing: PacingSettings::default(),
            scan: ScanSettings::default(),
            ingest: IngestSettings::default(),
            service: ServiceSettings::default(),
        }
    }
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            batch_size: 4000,
            lease_max_age_minutes: 30,
            min_popularity: 0,
            locator_denylist: Vec::new(),
            recheck_cooldown_days: 10,
        }
    }
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            call_ceiling: 5,
            cooldown_seconds: 60,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            window_seconds: 12,
            lead_trim_seconds: 7,
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            blocked_keywords: Vec::new(),
            playable_host_prefix: "https://audio-ssl.itunes.apple.com".to_string(),
            txn_max_attempts: 5,
            txn_backoff_base_ms: 50,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://amp.shazam.com/discovery/v5/en/US/android/-/tag".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ClaimSettings {
    pub fn lease_max_age(&self) -> Duration {
        Duration::from_secs(self.lease_max_age_minutes * 60)
    }
}

impl PacingSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("read {} failed: {}", path.display(), e)))?;
                let parsed: Config = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))?;
                info!(path = %path.display(), "Configuration loaded from TOML");
                parsed
            }
            Some(path) => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            None => Config::default(),
        };

        if let Ok(url) = std::env::var("SOUNDDEX_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(dir) = std::env::var("SOUNDDEX_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Ok(limit) = std::env::var("SOUNDDEX_CLAIM_BATCH_SIZE") {
            config.claim.batch_size = limit
                .parse()
                .map_err(|_| Error::Config(format!("invalid SOUNDDEX_CLAIM_BATCH_SIZE: {limit}")))?;
        }
        if let Ok(ceiling) = std::env::var("SOUNDDEX_CALL_CEILING") {
            config.pacing.call_ceiling = ceiling
                .parse()
                .map_err(|_| Error::Config(format!("invalid SOUNDDEX_CALL_CEILING: {ceiling}")))?;
        }

        Ok(config)
    }
}
