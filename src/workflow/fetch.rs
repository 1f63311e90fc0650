//! Claim-and-download phase
//!
//! Sweeps expired leases, claims a batch for this worker, and stages each
//! clip locally. Download failures release the row immediately; one bad
//! locator never stops the batch.

use crate::db::claim::ClaimQueue;
use crate::services::downloader::Downloader;
use crate::Result;
use std::path::PathBuf;

/// Paths staged by a fetch pass
#[derive(Debug, Default)]
pub struct FetchReport {
    pub staged: Vec<PathBuf>,
    pub failed: u64,
}

pub async fn claim_and_download(
    queue: &ClaimQueue,
    downloader: &Downloader,
    owner: &str,
) -> Result<FetchReport> {
    queue.sweep_expired_leases().await?;

    let claimed = queue.claim_batch(owner).await?;
    let mut report = FetchReport::default();

    for record in &claimed {
        match downloader.fetch(record).await {
            Ok(path) => {
                queue.report_download_outcome(record.guid, true).await?;
                report.staged.push(path);
            }
            Err(e) => {
                tracing::error!(
                    source_id = %record.source_id,
                    locator = %record.locator,
                    error = %e,
                    "Download failed, releasing claim"
                );
                queue.report_download_outcome(record.guid, false).await?;
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        staged = report.staged.len(),
        failed = report.failed,
        "Fetch phase finished"
    );

    Ok(report)
}
