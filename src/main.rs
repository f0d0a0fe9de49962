//! feedpulse main entry point
//!
//! This is the command-line interface for the feedpulse feed ingester.

use anyhow::{bail, Context};
use clap::Parser;
use feedpulse::config::{load_config_with_hash, Config, SourceDescriptor};
use feedpulse::fetch::Scheduler;
use feedpulse::output::{
    render_items, render_outcomes, render_sources, render_stats, CycleSummary, OutputFormat,
};
use feedpulse::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// feedpulse: concurrent feed ingestion
///
/// Fetches every configured JSON feed in parallel, normalizes the items
/// into one schema and stores them in SQLite, skipping duplicates.
#[derive(Parser, Debug)]
#[command(name = "feedpulse")]
#[command(version = "1.0.0")]
#[command(about = "Concurrent feed ingestion with normalized storage", long_about = None)]
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

    /// Validate config and list the sources without fetching
    #[arg(long, conflicts_with_all = ["report", "sources", "items"])]
    dry_run: bool,

    /// Show the per-source report from the database and exit
    #[arg(long, conflicts_with_all = ["sources", "items"])]
    report: bool,

    /// List configured sources with their stored item count and status
    #[arg(long, conflicts_with = "items")]
    sources: bool,

    /// Export stored items, newest first
    #[arg(long)]
    items: bool,

    /// With --items, only items timestamped at or after this RFC 3339 time
    #[arg(long, value_name = "TIME", requires = "items")]
    since: Option<String>,

    /// Output format: table, json or csv
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Only fetch, report on, or export the named source
    #[arg(long, value_name = "NAME")]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, cli.source.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config, &sources);
        Ok(ExitCode::SUCCESS)
    } else if cli.report {
        handle_report(&config, cli.source.as_deref(), cli.format)
    } else if cli.sources {
        handle_sources(&config, &sources, cli.format)
    } else if cli.items {
        handle_items(&config, cli.source.as_deref(), cli.since.as_deref(), cli.format)
    } else {
        handle_fetch(&config, &sources, cli.format).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("feedpulse=info,warn"),
            1 => EnvFilter::new("feedpulse=debug,info"),
            2 => EnvFilter::new("feedpulse=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Applies the --source filter
fn select_sources(config: &Config, only: Option<&str>) -> anyhow::Result<Vec<SourceDescriptor>> {
    match only {
        None => Ok(config.sources.clone()),
        Some(name) => {
            let selected: Vec<_> = config
                .sources
                .iter()
                .filter(|s| s.name == name)
                .cloned()
                .collect();
            if selected.is_empty() {
                bail!("no source named '{}' in the configuration", name);
            }
            Ok(selected)
        }
    }
}

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(config: &Config, sources: &[SourceDescriptor]) {
    let settings = &config.settings;
    println!("=== feedpulse Dry Run ===\n");

    println!("Settings:");
    println!("  Max concurrency: {}", settings.max_concurrency);
    println!("  Default timeout: {}s", settings.default_timeout_secs);
    println!("  Retries: {}", settings.retry_max);
    println!("  Retry base delay: {}ms", settings.retry_base_delay_ms);
    println!("  Database: {}", settings.storage_path);
    println!("  User agent: {}", settings.user_agent);

    println!("\nSources ({}):", sources.len());
    for source in sources {
        let shape = source.shape.map_or("auto-detect", |s| s.as_str());
        println!("  - {} [{}]", source.name, shape);
        println!("    url: {}", source.url);
        println!("    timeout: {}s", source.timeout(settings).as_secs());
        if !source.headers.is_empty() {
            let names: Vec<_> = source.headers.keys().map(String::as_str).collect();
            println!("    headers: {}", names.join(", "));
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --report mode: renders aggregate statistics
fn handle_report(
    config: &Config,
    only: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let storage = open_storage(Path::new(&config.settings.storage_path))?;

    let mut stats = storage.aggregate_stats()?;
    if let Some(name) = only {
        stats.retain(|s| s.source == name);
    }

    print!("{}", render_stats(&stats, format)?);
    Ok(ExitCode::SUCCESS)
}

/// Handles the --sources mode: configured sources joined with the database
fn handle_sources(
    config: &Config,
    sources: &[SourceDescriptor],
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let storage = open_storage(Path::new(&config.settings.storage_path))?;
    let stats = storage.aggregate_stats()?;

    print!("{}", render_sources(sources, &stats, format)?);
    Ok(ExitCode::SUCCESS)
}

/// Handles the --items mode: exports stored items
fn handle_items(
    config: &Config,
    only: Option<&str>,
    since: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    if let Some(since) = since {
        chrono::DateTime::parse_from_rfc3339(since)
            .with_context(|| format!("--since '{}' is not an RFC 3339 time", since))?;
    }

    let storage = open_storage(Path::new(&config.settings.storage_path))?;
    let items = storage.get_items(only, since)?;
    tracing::info!("Exporting {} items", items.len());

    print!("{}", render_items(&items, format)?);
    Ok(ExitCode::SUCCESS)
}

/// Runs one fetch cycle and renders the outcomes
async fn handle_fetch(
    config: &Config,
    sources: &[SourceDescriptor],
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let storage = open_storage(Path::new(&config.settings.storage_path))?;
    let scheduler = Scheduler::new(Arc::new(storage), config.settings.clone())?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, cancelling fetch cycle");
                signal_token.cancel();
            }
            Err(e) => tracing::error!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    let outcomes = match scheduler.run_cycle(sources, &cancel).await {
        Ok(outcomes) => outcomes,
        Err(e) if e.is_storage_fatal() => {
            tracing::error!("{}", e);
            eprintln!(
                "The database at {} is unusable. Delete it to start over.",
                config.settings.storage_path
            );
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    print!("{}", render_outcomes(&outcomes, format)?);

    let summary = CycleSummary::from_outcomes(&outcomes);
    if summary.all_failed() {
        tracing::error!("All {} sources failed", summary.total);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
