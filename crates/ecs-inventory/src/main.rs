//! ECS Inventory - reports in-use container images to Anchore
//!
//! Enumerates every ECS cluster in an account/region, collects the images of
//! all running containers and prints and/or posts one report per cluster.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use inventory_lib::{
    ecs::AwsEcsClient,
    observability::{self, StructuredLogger},
    InventoryCollector, InventoryCollectorBuilder, InventoryError, ReportDispatcher, RunSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

mod config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ECS Inventory
#[derive(Debug, Parser)]
#[command(name = "ecs-inventory")]
#[command(author, version, about = "Inventory of in-use container images on Amazon ECS, reported to Anchore", long_about = None)]
pub struct Cli {
    /// Application config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = info, -vv = debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Do not print inventory reports to stdout
    #[arg(long, short)]
    pub quiet: bool,

    /// Gather inventory but do not report it to Anchore
    #[arg(long)]
    pub dry_run: bool,

    /// Include task and service metadata in reports
    #[arg(long)]
    pub metadata: bool,

    /// AWS region to inventory
    #[arg(long, short)]
    pub region: Option<String>,

    /// Seconds between inventory runs (0 runs once and exits)
    #[arg(long, short)]
    pub polling_interval_seconds: Option<u64>,

    /// Maximum number of clusters processed concurrently
    #[arg(long)]
    pub max_concurrent_clusters: Option<usize>,

    /// Anchore URL the inventory is reported to
    #[arg(long)]
    pub anchore_url: Option<String>,

    /// Anchore user
    #[arg(long)]
    pub anchore_user: Option<String>,

    /// Anchore password
    #[arg(long)]
    pub anchore_password: Option<String>,

    /// Anchore account the inventory belongs to
    #[arg(long)]
    pub anchore_account: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::AppConfig::load(&cli)?;
    observability::init_tracing(&config.log_settings())?;
    debug!(config = ?config, "Loaded configuration");

    let api = Arc::new(AwsEcsClient::new(config.region.clone()).await);

    let logger = StructuredLogger::new(api.region());
    logger.log_startup(VERSION, config.polling_interval_seconds);

    let dispatcher = ReportDispatcher::from_target(config.dispatch_options(), &config.anchore)
        .context("Failed to create Anchore HTTP client")?;

    let collector = InventoryCollectorBuilder::new()
        .api(api)
        .dispatcher(Arc::new(dispatcher))
        .metadata(config.metadata)
        .max_concurrent_clusters(config.max_concurrent_clusters)
        .build()?;

    if config.polling_interval_seconds == 0 {
        run_once(&collector, &logger).await?;
        return Ok(());
    }

    poll(
        &collector,
        &logger,
        Duration::from_secs(config.polling_interval_seconds),
    )
    .await;
    Ok(())
}

/// Run a single inventory pass
async fn run_once(
    collector: &InventoryCollector,
    logger: &StructuredLogger,
) -> Result<RunSummary, InventoryError> {
    logger.log_run_started();

    match collector.run().await {
        Ok(summary) => {
            logger.log_run_complete(&summary);
            Ok(summary)
        }
        Err(e) => {
            logger.log_run_failed(&e);
            Err(e)
        }
    }
}

/// Run inventory passes every `period` until interrupted
///
/// A failed pass is logged and retried on the next tick.
async fn poll(collector: &InventoryCollector, logger: &StructuredLogger, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = run_once(collector, logger).await;
            }
            _ = &mut shutdown => {
                logger.log_shutdown("SIGINT received");
                break;
            }
        }
    }
}
