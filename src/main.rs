//! geofencer - classify devices by movement across a circular geofence
//!
//! Reads timestamped location pings per device (IP address), decides which
//! devices entered, left or stayed inside a fence around a target point, and
//! writes a category table, per-device JSONL results and an HTML map.
//!
//! Module structure:
//! - `domain/` - Core types (GeoPoint, Observation, Category, reports)
//! - `services/` - Distance evaluation and transition classification
//! - `io/` - CSV loading, splitting, table/JSONL/map output
//! - `infra/` - Config and run metrics

use anyhow::Context;
use clap::{Parser, Subcommand};
use geofencer::infra::{Config, MalformedPolicy, RunStats};
use geofencer::io::{new_run_id, split_file, CategoryTable, Egress, Loader, MapRenderer};
use geofencer::services::classify_concurrent;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Geofence transition classifier for device location pings
#[derive(Parser, Debug)]
#[command(name = "geofencer", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify devices and write table, JSONL and map outputs
    Classify {
        /// Input CSV (overrides input.file)
        #[arg(short, long)]
        input: Option<String>,
        /// Target latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Target longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Fence radius in meters
        #[arg(long)]
        radius: Option<f64>,
        /// Output directory (overrides output.dir)
        #[arg(short, long)]
        out_dir: Option<String>,
        /// Concurrent classification workers (0 = available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Fail on the first malformed record instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Write a copy of a CSV with latitude/longitude split out of the location column
    Split {
        #[arg(short, long)]
        input: String,
        #[arg(short, long)]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "geofencer_starting");

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::resolve_config_path);
    let config = Config::load_from_path(&config_path);

    match args.command {
        Command::Classify { input, lat, lon, radius, out_dir, workers, strict } => {
            let mut config = config.with_target(lat, lon);
            if let Some(radius) = radius {
                config = config.with_radius_meters(radius);
            }
            if let Some(input) = input.as_deref() {
                config = config.with_input_file(input);
            }
            if let Some(dir) = out_dir.as_deref() {
                config = config.with_output_dir(dir);
            }
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            if strict {
                config = config.with_malformed_policy(MalformedPolicy::Abort);
            }
            run_classify(&config).await
        }
        Command::Split { input, output } => {
            let rows = split_file(&input, &output, config.columns())
                .with_context(|| format!("Failed to split {}", input))?;
            info!(rows = %rows, output = %output, "split_complete");
            Ok(())
        }
    }
}

/// Load, classify and export one run
async fn run_classify(config: &Config) -> anyhow::Result<()> {
    let fence = config.geofence().context("Invalid target configuration")?;
    let run_id = new_run_id();

    info!(
        run_id = %run_id,
        config_file = %config.config_file(),
        input = %config.input_file(),
        target_lat = %fence.center().latitude,
        target_lon = %fence.center().longitude,
        radius_meters = %fence.radius_meters(),
        malformed_policy = ?config.malformed_policy(),
        output_dir = %config.output_dir(),
        "config_loaded"
    );

    let stats = Arc::new(RunStats::new());

    // Structural problems abort here, before any classification
    let loader = Loader::new(config.columns().clone(), config.malformed_policy());
    let devices = loader
        .load_file(config.input_file(), &stats)
        .with_context(|| format!("Failed to load {}", config.input_file()))?;

    let report =
        classify_concurrent(devices, fence, config.effective_workers(), Arc::clone(&stats)).await?;

    let table_path = config.output_path(config.table_file());
    CategoryTable::from_report(&report)
        .write_file(&table_path)
        .with_context(|| format!("Failed to write {}", table_path.display()))?;

    let egress_path = config.output_path(config.classifications_file());
    Egress::new(&egress_path, &run_id)
        .write_report(&report)
        .with_context(|| format!("Failed to write {}", egress_path.display()))?;

    let map_path = config.output_path(config.map_file());
    MapRenderer::default()
        .write(&map_path, &fence, &report)
        .with_context(|| format!("Failed to write {}", map_path.display()))?;

    if !report.skipped.is_empty() {
        warn!(skipped = %report.skipped.len(), "some_devices_not_classified");
    }

    stats.summary().log();
    info!(run_id = %run_id, "geofencer_run_complete");
    Ok(())
}
