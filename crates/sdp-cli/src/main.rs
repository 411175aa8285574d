//! SDP - statistics data pipeline runner
//!
//! Orchestrates the two pipeline stages: ingesting indicator data from the
//! World Bank API into raw CSVs, and loading those CSVs into Postgres with a
//! staging-to-production swap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdp_common::logging::{init_logging, LogConfig};
use sdp_common::sources::world_bank_sources;
use sdp_common::{DataSource, PipelineConfig};
use sdp_ingest::world_bank::WorldBankIngestion;
use sdp_load::db::{create_pool, DbConfig};
use sdp_load::Loader;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sdp")]
#[command(author, version, about = "Statistics data pipeline: ingest public indicator APIs and load them into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for raw CSV files (overrides SDP_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Postgres connection string (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch indicator data from the World Bank API and write raw CSVs
    Ingest,

    /// Load raw CSVs into staging and promote them to production
    Load,

    /// Run the full pipeline: ingest, then load
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config = log_config.with_level(Level::DEBUG);
    }

    // The guard flushes file logs when dropped at the end of the run
    let _guard = init_logging(&log_config)?;

    let mut config = PipelineConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let sources = world_bank_sources();

    // Ctrl-C cancels in-flight fetches instead of killing mid-page
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Ingest => run_ingest(&config, &sources, cancel).await?,
        Command::Load => run_load(&config, &sources, cli.database_url).await?,
        Command::All => {
            run_ingest(&config, &sources, cancel).await?;
            run_load(&config, &sources, cli.database_url).await?;
        },
    }

    info!("pipeline run complete");
    Ok(())
}

async fn run_ingest(
    config: &PipelineConfig,
    sources: &[DataSource],
    cancel: CancellationToken,
) -> Result<()> {
    let job = WorldBankIngestion::new(&config.data_dir)?.with_cancellation(cancel);
    job.run(sources).await?;
    Ok(())
}

async fn run_load(
    config: &PipelineConfig,
    sources: &[DataSource],
    database_url: Option<String>,
) -> Result<()> {
    let db_config = match database_url {
        Some(url) => DbConfig::new(url),
        None => DbConfig::from_env()?,
    };
    let pool = create_pool(&db_config).await?;

    let loader = Loader::new(pool, config);
    loader.run(&config.data_dir, sources).await?;
    Ok(())
}
