mod runner;
mod samples;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tier_dispatch::DispatchConfig;
use tracing::info;

/// Tiered fallback dispatcher: runs a batch of samples through the tier
/// ladder and prints one JSON result per line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding an array of samples
    input: PathBuf,

    /// Tier configuration (TOML, or JSON when the extension is .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run every sample on this tier only
    #[arg(long)]
    force: Option<String>,

    /// Reject invalid input instead of degrading to the terminal tier
    #[arg(long, default_value_t = false)]
    no_escalate: bool,

    /// Number of blocking workers sharing the dispatcher
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Print the statistics snapshot after the results
    #[arg(long, default_value_t = false)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => DispatchConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .with_env_overrides(),
        None => DispatchConfig::from_env(),
    };
    if args.no_escalate {
        config.escalate_on_invalid_input = false;
    }

    let dispatcher = Arc::new(config.build().context("Invalid tier configuration")?);
    info!(
        tiers = ?dispatcher.tier_names(),
        escalate = dispatcher.escalates_on_invalid_input(),
        "Dispatcher ready"
    );

    let samples = samples::load_samples(&args.input)?;
    info!(count = samples.len(), concurrency = args.concurrency, "Running samples");

    let results = runner::run_samples(
        Arc::clone(&dispatcher),
        samples,
        args.force.clone(),
        args.concurrency,
    )
    .await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for result in &results {
        writeln!(out, "{}", runner::render(result))?;
    }
    if args.stats {
        let stats = dispatcher.statistics();
        info!(
            total = stats.total_calls,
            success_rate = stats.success_rate(),
            "Batch complete"
        );
        writeln!(out, "{}", json!({ "statistics": stats }))?;
    }
    out.flush()?;

    Ok(())
}
