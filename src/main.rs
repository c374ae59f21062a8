//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest page asset harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use sumi_harvest::config::{load_config_with_hash, validate_job_config, Config};
use sumi_harvest::output::{print_statistics, JobStatistics};
use sumi_harvest::jobs::JobProgress;
use sumi_harvest::{validate_seed_url, Engine, JobStatus};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: A polite page asset harvester
///
/// Sumi-Harvest fetches one page, finds every image, script, stylesheet,
/// font and media file it references, and downloads them into
/// `<save-root>/<job-id>/<kind>/` under a request-rate ceiling.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A polite page asset harvester", long_about = None)]
struct Cli {
    /// Page to harvest resources from
    #[arg(value_name = "SEED_URL")]
    seed_url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long)]
    max_concurrent: Option<u32>,

    /// Requests allowed per rate interval
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Directory that receives one subdirectory per job
    #[arg(long)]
    save_root: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, &cli);
    validate_job_config(&config.engine).context("Invalid job settings")?;
    validate_seed_url(&cli.seed_url)
        .with_context(|| format!("Invalid seed URL: {}", cli.seed_url))?;

    if cli.dry_run {
        handle_dry_run(&config, &cli.seed_url);
        return Ok(ExitCode::SUCCESS);
    }

    handle_harvest(config, &cli.seed_url).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(max_concurrent) = cli.max_concurrent {
        config.engine.max_concurrent = max_concurrent;
    }
    if let Some(rate_limit) = cli.rate_limit {
        config.engine.rate_limit_per_interval = rate_limit;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.engine.timeout_ms = timeout_ms;
    }
    if let Some(save_root) = &cli.save_root {
        config.engine.save_root = save_root.clone();
    }
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, seed_url: &str) {
    let engine = &config.engine;

    println!("=== Sumi-Harvest Dry Run ===\n");
    println!("Seed URL: {}\n", seed_url);

    println!("Job Configuration:");
    println!("  Max concurrent: {}", engine.max_concurrent);
    println!(
        "  Rate limit: {} requests per {}ms",
        engine.rate_limit_per_interval, engine.rate_interval_ms
    );
    println!("  Timeout: {}ms", engine.timeout_ms);
    println!("  Max attempts: {}", engine.max_attempts);
    println!(
        "  Backoff: {}ms doubling, capped at {}ms",
        engine.backoff_base_ms, engine.backoff_max_ms
    );
    println!("  Max response size: {} bytes", engine.max_response_bytes);
    println!("  Save root: {}", engine.save_root.display());

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Manifest: {}", config.output.write_manifest);
    println!("  Summary: {}", config.output.write_summary);

    println!("\n✓ Configuration is valid");
}

/// Waits for the next progress update
///
/// Returns `None` once the current status is terminal, including a job
/// that finished before the receiver was created.
async fn next_progress(progress: &mut watch::Receiver<JobProgress>) -> Option<JobProgress> {
    if progress.borrow().status.is_terminal() {
        return None;
    }
    progress.changed().await.ok()?;
    Some(*progress.borrow_and_update())
}

/// Runs one job, cancelling it on Ctrl-C
async fn handle_harvest(config: Config, seed_url: &str) -> anyhow::Result<ExitCode> {
    let engine = Engine::new(&config);
    let id = engine.submit(seed_url, config.engine.clone())?;
    tracing::info!("Job {} started", id);

    let mut progress = engine.subscribe(id)?;
    let mut interrupted = false;

    loop {
        tokio::select! {
            update = next_progress(&mut progress) => {
                let Some(current) = update else {
                    break;
                };
                tracing::info!(
                    "Progress: {} discovered, {} downloaded, {} failed, {} duplicates",
                    current.counters.discovered,
                    current.counters.downloaded,
                    current.counters.failed,
                    current.counters.skipped_duplicate
                );
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                tracing::warn!("Interrupt received, cancelling job {}", id);
                engine.cancel(id)?;
                interrupted = true;
            }
        }
    }

    let job = engine.wait(id).await?;
    let stats = JobStatistics::from_job(&job);
    print_statistics(&job, &stats);

    let code = match job.status {
        JobStatus::Completed => ExitCode::SUCCESS,
        JobStatus::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    };

    Ok(code)
}
