//! Booru-Harvest main entry point
//!
//! Command-line interface for the image-post ingestion pipeline.

use anyhow::Context;
use booru_harvest::config::load_config_with_hash;
use booru_harvest::harvest::{discover_max_post_id, Coordinator, HttpClient};
use booru_harvest::index::sink_from_config;
use booru_harvest::storage::{open_store, Store};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Booru-Harvest: an image-post ingestion pipeline
///
/// Discovers the highest valid post ID in a numerically-indexed catalog,
/// fetches post pages, extracts image metadata and tags, downloads images,
/// and records everything idempotently in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "booru-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An image-post ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// First post ID to ingest
    #[arg(long, default_value_t = 1)]
    start_id: u64,

    /// Last post ID to ingest; discovered from the catalog when omitted
    #[arg(long)]
    end_id: Option<u64>,

    /// Override the configured concurrency limit
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only discover and print the catalog boundary, then exit
    #[arg(long, conflicts_with = "stats")]
    discover_only: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "discover_only")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(concurrency) = cli.concurrency {
        anyhow::ensure!(concurrency >= 1, "--concurrency must be at least 1");
        config.harvest.concurrency = concurrency;
    }

    if cli.stats {
        return handle_stats(&config);
    }

    // The shared HTTP transport lives for the rest of the process; every
    // component borrows it through this Arc
    let client = Arc::new(
        HttpClient::new(Duration::from_secs(config.harvest.request_timeout_secs))
            .context("failed to build HTTP client")?,
    );

    if cli.discover_only {
        let max = discover_max_post_id(client.clone(), &config.catalog, cli.start_id).await;
        println!("Catalog boundary: {}", max);
        return Ok(());
    }

    let store = open_store(std::path::Path::new(&config.storage.database_path))
        .context("failed to open database")?;
    let store = Arc::new(Mutex::new(store));
    let index = sink_from_config(client.clone(), config.index.as_ref());

    let start_id = cli.start_id;
    let end_id = cli.end_id;
    let coordinator = Coordinator::new(config, client, store, index);

    let report = coordinator.ingest_range(start_id, end_id).await?;

    println!(
        "Ingested {}..={}: {} succeeded, {} failed",
        report.start_id,
        report.end_id,
        report.succeeded,
        report.failed.len()
    );
    if !report.failed.is_empty() {
        println!("Failed IDs: {:?}", report.failed);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("booru_harvest=info,warn"),
            1 => EnvFilter::new("booru_harvest=debug,info"),
            2 => EnvFilter::new("booru_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows row counts from the database
fn handle_stats(config: &booru_harvest::Config) -> anyhow::Result<()> {
    let store = open_store(std::path::Path::new(&config.storage.database_path))
        .context("failed to open database")?;

    println!("Database: {}", config.storage.database_path);
    println!("  Pictures:     {}", store.count_pictures()?);
    println!("  Tags:         {}", store.count_tags()?);
    println!("  Associations: {}", store.count_associations()?);

    Ok(())
}
