// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! perf-logger - Log vessel performance data to rotating CSV files.
//!
//! Reads Signal K delta messages (one JSON object per line) from stdin.
//!
//! Usage:
//!   perf-logger --logdir /var/log/perf
//!   perf-logger --config perf-logger.yaml --verbose
//!   perf-logger --logdir ./perf --period 10 --interval 0 --model first-40

use anyhow::{Context, Result};
use clap::Parser;
use perf_logger::{PerfLogger, PerfLoggerConfig, SignalKModel, TracingStatus};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "perf-logger")]
#[command(about = "Log vessel performance data to rotating CSV files")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file directory
    #[arg(short, long)]
    logdir: Option<PathBuf>,

    /// Log rotation interval in seconds (0 disables rotation)
    #[arg(short, long, allow_hyphen_values = true)]
    interval: Option<i64>,

    /// Sampling period in seconds
    #[arg(short, long)]
    period: Option<u64>,

    /// Subscription context (default vessels.self)
    #[arg(long)]
    context: Option<String>,

    /// Own vessel URN as sent by the server, e.g. vessels.urn:mrn:imo:mmsi:230099999;
    /// its deltas are logged under --context
    #[arg(long)]
    self_urn: Option<String>,

    /// Vessel model
    #[arg(long)]
    model: Option<String>,

    /// Sail configuration
    #[arg(long)]
    sail_config: Option<String>,

    /// Engine state
    #[arg(long)]
    engine: Option<String>,

    /// Compressor command (the file path is appended), e.g. "gzip -9"
    #[arg(long)]
    compressor: Option<String>,

    /// Wait up to this many milliseconds for compression at shutdown
    #[arg(long)]
    shutdown_grace_ms: Option<u64>,

    /// Trace every written row
    #[arg(long)]
    trace_rows: bool,

    /// Verbose mode (debug logs)
    #[arg(short, long)]
    verbose: bool,
}

/// Why the main thread woke up.
enum Wakeup {
    Interrupted,
    InputClosed,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("perf_logger=debug")
    } else {
        EnvFilter::new("perf_logger=info")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let config = build_config(&args)?;
    let mut model = SignalKModel::new(config.context.clone());
    if let Some(urn) = &config.self_urn {
        model = model.with_alias(urn.clone(), config.context.clone());
    }
    let model = Arc::new(model);

    let mut logger = PerfLogger::start(config, model.clone(), Arc::new(TracingStatus))
        .context("Failed to start performance logger")?;

    let (wake_tx, wake_rx) = mpsc::channel::<Wakeup>();

    let ctrlc_tx = wake_tx.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        let _ = ctrlc_tx.send(Wakeup::Interrupted);
    })?;

    let reader_model = Arc::clone(&model);
    std::thread::Builder::new()
        .name("perf-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = reader_model.apply_delta_str(&line) {
                    tracing::debug!("ignoring delta: {}", e);
                }
            }
            let _ = wake_tx.send(Wakeup::InputClosed);
        })
        .context("Failed to spawn stdin reader")?;

    match wake_rx.recv() {
        Ok(Wakeup::InputClosed) => tracing::info!("Input closed, shutting down"),
        Ok(Wakeup::Interrupted) | Err(_) => {}
    }

    logger.stop();

    let stats = logger.stats();
    tracing::info!("  Rows written: {}", stats.rows_written);
    tracing::info!("  Stale samples: {}", stats.rows_stale);
    tracing::info!("  Write errors: {}", stats.write_errors);
    tracing::info!("  Files: {}", stats.rotations);

    Ok(())
}

/// YAML file first, then command-line overrides.
fn build_config(args: &Args) -> Result<PerfLoggerConfig> {
    let mut config = match &args.config {
        Some(path) => PerfLoggerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PerfLoggerConfig::default(),
    };

    if let Some(dir) = &args.logdir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(interval) = args.interval {
        config.rotation_interval_secs = interval;
    }
    if let Some(period) = args.period {
        config.sample_period_secs = period;
    }
    if let Some(context) = &args.context {
        config.context = context.clone();
    }
    if let Some(urn) = &args.self_urn {
        config.self_urn = Some(urn.clone());
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(sail_config) = &args.sail_config {
        config.sail_config = sail_config.clone();
    }
    if let Some(engine) = &args.engine {
        config.engine = engine.clone();
    }
    if let Some(command) = &args.compressor {
        config.compressor = command.split_whitespace().map(str::to_string).collect();
    }
    if let Some(grace) = args.shutdown_grace_ms {
        config.shutdown_grace_ms = grace;
    }
    if args.trace_rows {
        config.trace_rows = true;
    }

    Ok(config)
}
