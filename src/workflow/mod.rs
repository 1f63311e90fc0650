//! Worker cycle orchestration
//!
//! One cycle = fetch (claim + download) → recognize (signatures + service)
//! → ingest (payloads into the catalog). Phases communicate only through
//! the catalog and the result spool, so each can also run on its own.

pub mod fetch;
pub mod ingest;
pub mod recognize;
pub mod spool;

use crate::config::Config;
use crate::db::claim::ClaimQueue;
use crate::services::downloader::Downloader;
use crate::services::recognizer::{CallBudget, RecognitionEngine};
use crate::services::shazam_client::ShazamClient;
use crate::workflow::spool::ResultSpool;
use crate::Result;
use sqlx::SqlitePool;

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Recognize,
    Ingest,
    All,
}

impl Phase {
    fn includes(self, other: Phase) -> bool {
        self == Phase::All || self == other
    }
}

/// Run one worker cycle for `owner`
pub async fn run_cycle(pool: &SqlitePool, config: &Config, owner: &str, phase: Phase) -> Result<()> {
    let spool = ResultSpool::new(&config.spool_path);

    if phase.includes(Phase::Fetch) {
        let queue = ClaimQueue::new(pool.clone(), config.claim.clone());
        let downloader = Downloader::new(&config.download_dir)?;
        fetch::claim_and_download(&queue, &downloader, owner).await?;
    }

    if phase.includes(Phase::Recognize) {
        let engine = RecognitionEngine::new(ShazamClient::new(&config.service)?, config.scan);
        let mut budget = CallBudget::new(config.pacing.call_ceiling, config.pacing.cooldown());
        recognize_staged_dir(&engine, &mut budget, config, &spool).await?;
    }

    if phase.includes(Phase::Ingest) {
        let entries = spool.take()?;
        if entries.is_empty() {
            tracing::info!("No spooled results to ingest");
        } else {
            ingest::ingest_batch(pool, &entries, &config.ingest).await?;
        }
    }

    Ok(())
}

async fn recognize_staged_dir(
    engine: &RecognitionEngine<ShazamClient>,
    budget: &mut CallBudget,
    config: &Config,
    spool: &ResultSpool,
) -> Result<u64> {
    if !config.download_dir.exists() {
        tracing::info!(dir = %config.download_dir.display(), "Download directory absent, nothing to recognize");
        return Ok(0);
    }
    recognize::recognize_staged(&config.download_dir, engine, budget, spool).await
}
