//! Sitelint main entry point
//!
//! This is the command-line interface for the sitelint validation crawler.

use clap::Parser;
use sitelint::config::load_config_with_hash;
use sitelint::crawl::{CrawlLock, Orchestrator};
use sitelint::storage::{SqliteStorage, Storage};
use sitelint::validation::{build_validator_client, HttpValidationClient};
use sitelint::SitelintError;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Sitelint: a site-wide markup validation crawler
///
/// Sitelint walks a content inventory, validates each URL against an
/// external markup validator, and aggregates site health statistics per
/// content type. Runs are serialized by an expiring database lock.
#[derive(Parser, Debug)]
#[command(name = "sitelint")]
#[command(version)]
#[command(about = "A site-wide markup validation crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured URL cap for this invocation
    #[arg(long, value_name = "N")]
    max_urls: Option<usize>,

    /// Show the report of the latest run and exit
    #[arg(long, conflicts_with_all = ["status", "force_unlock", "import"])]
    stats: bool,

    /// Show lock and latest-run status and exit
    #[arg(long, conflicts_with_all = ["stats", "force_unlock", "import"])]
    status: bool,

    /// Clear the crawl lock regardless of owner and exit
    #[arg(long, conflicts_with_all = ["stats", "status", "import"])]
    force_unlock: bool,

    /// Import inventory entries ("<content-type> <url>" per line) and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["stats", "status", "force_unlock"])]
    import: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.stats {
        handle_stats(&config)?;
    } else if cli.status {
        handle_status(&config)?;
    } else if cli.force_unlock {
        handle_force_unlock(&config)?;
    } else if let Some(inventory_path) = &cli.import {
        handle_import(&config, inventory_path)?;
    } else {
        handle_crawl(config, config_hash, cli.max_urls).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitelint=info,warn"),
            1 => EnvFilter::new("sitelint=debug,info"),
            2 => EnvFilter::new("sitelint=trace,debug"),
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

/// Opens the configured database
fn open_storage(config: &sitelint::config::Config) -> Result<SqliteStorage, SitelintError> {
    Ok(SqliteStorage::new(Path::new(&config.output.database_path))?)
}

/// Handles the --stats mode: shows the report of the latest run
fn handle_stats(config: &sitelint::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    use sitelint::output::{load_report, print_report};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    match load_report(&storage)? {
        Some(report) => print_report(&report),
        None => println!("No crawl has run yet"),
    }

    Ok(())
}

/// Handles the --status mode: shows lock state and the latest run row
fn handle_status(config: &sitelint::config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(Mutex::new(open_storage(config)?));

    let lock = CrawlLock::new(Arc::clone(&storage), config.crawl.lock_timeout_secs);
    if lock.is_locked()? {
        match storage.lock().unwrap().get_lock()? {
            Some(record) => println!(
                "Lock: held (a crawl is in progress, lease expires at unix {})",
                record.expires_at
            ),
            None => println!("Lock: held (a crawl is in progress)"),
        }
    } else {
        println!("Lock: free");
    }

    let latest = storage.lock().unwrap().get_latest_run()?;
    match latest {
        Some(run) => println!(
            "Latest run: #{} ({}, started {})",
            run.id,
            run.status.to_db_string(),
            run.started_at
        ),
        None => println!("Latest run: none"),
    }

    Ok(())
}

/// Handles the --force-unlock mode: clears a stuck lock
fn handle_force_unlock(
    config: &sitelint::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(Mutex::new(open_storage(config)?));
    let lock = CrawlLock::new(storage, config.crawl.lock_timeout_secs);
    lock.force_unlock()?;
    println!("✓ Crawl lock cleared");
    Ok(())
}

/// Handles the --import mode: loads inventory entries from a text file
///
/// Each non-empty line is `<content-type> <url>`; lines starting with `#`
/// are comments.
fn handle_import(
    config: &sitelint::config::Config,
    inventory_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_storage(config)?;
    let file = std::fs::File::open(inventory_path)?;

    let mut imported = 0usize;
    for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let (content_type, url) = match (parts.next(), parts.next(), parts.next()) {
            (Some(content_type), Some(url), None) => (content_type, url),
            _ => {
                return Err(SitelintError::Import {
                    line: index + 1,
                    message: "expected \"<content-type> <url>\"".to_string(),
                }
                .into());
            }
        };

        if let Err(e) = url::Url::parse(url) {
            return Err(SitelintError::Import {
                line: index + 1,
                message: format!("invalid URL {}: {}", url, e),
            }
            .into());
        }

        storage.upsert_url(url, content_type)?;
        imported += 1;
    }

    println!("✓ Imported {} inventory entries", imported);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: sitelint::config::Config,
    config_hash: String,
    max_urls: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cap = max_urls.unwrap_or(config.crawl.url_cap);
    tracing::info!(
        "Starting validation crawl (cap: {}, validator param: {})",
        cap,
        config.validator.query_param
    );

    let storage = Arc::new(Mutex::new(open_storage(&config)?));
    let http = build_validator_client(config.validator.timeout_secs)?;
    let client = HttpValidationClient::new(http, config.validator.query_param.clone());
    let orchestrator = Orchestrator::new(storage, client, config, config_hash);

    match orchestrator.run_crawl(cap).await {
        Ok(run) => {
            let valid_total: u64 = run.validity_by_type.values().map(|v| v.valid_count).sum();
            tracing::info!(
                "Crawl completed: {} URLs processed, {} valid, {} errors reported",
                run.urls_processed,
                valid_total,
                run.total_errors
            );
            Ok(())
        }
        Err(SitelintError::AlreadyLocked) => {
            tracing::warn!("A validation crawl is already in progress; try again later");
            Err(SitelintError::AlreadyLocked.into())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
