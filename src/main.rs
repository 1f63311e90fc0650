//! sounddex worker binary
//!
//! Runs one pipeline cycle (or a single phase) against the shared catalog.
//! Multiple workers may run concurrently; the claim statement keeps their
//! batches disjoint.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use sounddex::config::Config;
use sounddex::workflow::{self, Phase};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[clap(name = "sounddex")]
#[clap(about = "Catalog-driven audio clip recognition worker")]
struct Args {
    /// TOML configuration file
    #[clap(long, env = "SOUNDDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Lease owner id; defaults to a fresh uuid per run
    #[clap(long)]
    owner: Option<String>,

    /// Pipeline phase to run
    #[clap(long, value_enum, default_value_t = PhaseArg::All)]
    phase: PhaseArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Fetch,
    Recognize,
    Ingest,
    All,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Fetch => Phase::Fetch,
            PhaseArg::Recognize => Phase::Recognize,
            PhaseArg::Ingest => Phase::Ingest,
            PhaseArg::All => Phase::All,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting sounddex worker");

    let config = Config::load(args.config.as_deref())?;
    let owner = args.owner.unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(owner = %owner, database = %config.database_url, "Worker configured");

    let pool = sounddex::db::init_pool(&config.database_url).await?;

    workflow::run_cycle(&pool, &config, &owner, args.phase.into()).await?;

    tracing::info!("Worker cycle complete");

    Ok(())
}
