// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger service: startup sequence, periodic workers and shutdown.
//!
//! After the synchronous startup (directory check, recovery compression,
//! first rotation) two worker threads run independently: one samples every
//! period, the other rotates every rotation interval (if enabled).
//! [`PerfLogger::stop`] joins both, then performs the final rotation.

use crate::compress::{Compressor, ExternalCompressor};
use crate::config::{ConfigError, PerfLoggerConfig};
use crate::rotation::{RotationError, RotationManager};
use crate::sampler::Sampler;
use crate::source::ReadingSource;
use crate::status::StatusSink;
use crate::writer::LogWriter;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// Errors that keep the logger from starting.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to create log directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("Rotation error: {0}")]
    Rotation(#[from] RotationError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Live counters, shared with the worker threads.
#[derive(Debug, Default)]
struct Counters {
    rows_written: AtomicU64,
    rows_stale: AtomicU64,
    write_errors: AtomicU64,
    rotations: AtomicU64,
    compressions_submitted: AtomicU64,
}

/// Logger statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Rows appended to an active file.
    pub rows_written: u64,

    /// Sampling ticks skipped because the data was stale.
    pub rows_stale: u64,

    /// Rows dropped because the append failed.
    pub write_errors: u64,

    /// Active files opened (startup included).
    pub rotations: u64,

    /// Compression jobs submitted (recovery and shutdown included).
    pub compressions_submitted: u64,
}

/// State shared by the public handle and the workers.
struct Core {
    rotation: RotationManager,
    sampler: Sampler,
    status: Arc<dyn StatusSink>,
    counters: Counters,
    trace_rows: bool,
}

impl Core {
    fn sample_tick(&self) -> bool {
        let Some(row) = self.sampler.sample(Utc::now()) else {
            self.counters.rows_stale.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let line = row.to_line();
        match self.rotation.append_row(&line) {
            Ok(()) => {
                self.counters.rows_written.fetch_add(1, Ordering::Relaxed);
                if self.trace_rows {
                    self.status.debug(line.trim_end());
                }
                true
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping row: {}", e);
                false
            }
        }
    }

    fn rotation_tick(&self) -> bool {
        match self.rotation.rotate(Utc::now()) {
            Ok(_) => {
                self.counters.rotations.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .compressions_submitted
                    .fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                tracing::warn!("Rotation failed: {}", e);
                false
            }
        }
    }

    fn stats(&self) -> LoggerStats {
        let c = &self.counters;
        LoggerStats {
            rows_written: c.rows_written.load(Ordering::Relaxed),
            rows_stale: c.rows_stale.load(Ordering::Relaxed),
            write_errors: c.write_errors.load(Ordering::Relaxed),
            rotations: c.rotations.load(Ordering::Relaxed),
            compressions_submitted: c.compressions_submitted.load(Ordering::Relaxed),
        }
    }
}

/// Periodic worker thread with a stop channel.
///
/// Dropping the sender disconnects the channel, which wakes the worker out
/// of `recv_timeout` immediately.
struct Worker {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => tick(),
                }
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

/// Running performance logger.
pub struct PerfLogger {
    core: Arc<Core>,
    compressor: Arc<dyn Compressor>,
    workers: Vec<Worker>,
    shutdown_grace: Duration,
    stopped: bool,
}

impl PerfLogger {
    /// Start with the configured external compressor.
    pub fn start(
        config: PerfLoggerConfig,
        source: Arc<dyn ReadingSource>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self, StartError> {
        let compressor = Arc::new(ExternalCompressor::new(&config.compressor, status.clone()));
        Self::start_with(config, source, status, compressor)
    }

    /// Start with a caller-supplied compressor.
    ///
    /// Fatal failures are reported through `status` and nothing is started.
    pub fn start_with(
        config: PerfLoggerConfig,
        source: Arc<dyn ReadingSource>,
        status: Arc<dyn StatusSink>,
        compressor: Arc<dyn Compressor>,
    ) -> Result<Self, StartError> {
        if let Err(e) = config.validate() {
            let message = match e {
                ConfigError::MissingLogDir => {
                    "Log directory not defined, logger disabled".to_string()
                }
                ref other => format!("Invalid configuration ({}), logger disabled", other),
            };
            status.set_status(&message);
            return Err(e.into());
        }

        let dir = config.log_dir.clone().ok_or(ConfigError::MissingLogDir)?;
        if !dir.is_dir() {
            if let Err(source) = std::fs::create_dir_all(&dir) {
                status.set_status(&format!(
                    "Unable to create log directory {}, logger disabled",
                    dir.display()
                ));
                return Err(StartError::CreateDir { dir, source });
            }
        }

        let core = Arc::new(Core {
            rotation: RotationManager::new(LogWriter::new(&dir), compressor.clone()),
            sampler: Sampler::new(
                source,
                config.context.clone(),
                config.row_settings(),
                config.sample_period(),
            ),
            status,
            counters: Counters::default(),
            trace_rows: config.trace_rows,
        });

        let outcome = core.rotation.startup(Utc::now())?;
        core.counters.rotations.fetch_add(1, Ordering::Relaxed);
        if outcome.recovered.is_some() {
            core.counters
                .compressions_submitted
                .fetch_add(1, Ordering::Relaxed);
        }

        let mut logger = Self {
            core,
            compressor,
            workers: Vec::new(),
            shutdown_grace: config.shutdown_grace(),
            stopped: false,
        };

        let sampling = {
            let core = Arc::clone(&logger.core);
            Worker::spawn("perf-sample", config.sample_period(), move || {
                core.sample_tick();
            })
        };
        match sampling {
            Ok(worker) => logger.workers.push(worker),
            Err(e) => {
                logger.stop();
                return Err(StartError::Spawn(e));
            }
        }

        if let Some(interval) = config.rotation_interval() {
            let core = Arc::clone(&logger.core);
            match Worker::spawn("perf-rotate", interval, move || {
                core.rotation_tick();
            }) {
                Ok(worker) => logger.workers.push(worker),
                Err(e) => {
                    logger.stop();
                    return Err(StartError::Spawn(e));
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            active = %outcome.active,
            period_secs = config.sample_period_secs,
            rotation_secs = config.rotation_interval_secs,
            "logging performance data"
        );

        Ok(logger)
    }

    /// Take a sample immediately. Returns `true` if a row was written.
    pub fn sample_now(&self) -> bool {
        self.core.sample_tick()
    }

    /// Rotate immediately. Returns `true` on success.
    pub fn rotate_now(&self) -> bool {
        self.core.rotation_tick()
    }

    /// Name of the active file.
    pub fn active_file(&self) -> Option<String> {
        self.core.rotation.active_file()
    }

    /// Number of periodic workers (sampling, plus rotation when enabled).
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether `stop` has not run yet.
    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Current statistics.
    pub fn stats(&self) -> LoggerStats {
        self.core.stats()
    }

    /// Stop both workers, then retire and compress the active file.
    ///
    /// Compression continues in the background; at most the configured
    /// grace period is spent waiting for it. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        for worker in &mut self.workers {
            worker.stop();
        }
        self.workers.clear();

        if self.core.rotation.shutdown().is_some() {
            self.core
                .counters
                .compressions_submitted
                .fetch_add(1, Ordering::Relaxed);
        }

        if !self.shutdown_grace.is_zero() && !self.compressor.wait_idle(self.shutdown_grace) {
            tracing::info!(
                pending = self.compressor.in_flight(),
                "compression still running at shutdown"
            );
        }

        let stats = self.core.stats();
        tracing::info!(
            rows_written = stats.rows_written,
            rows_stale = stats.rows_stale,
            write_errors = stats.write_errors,
            rotations = stats.rotations,
            "performance logger stopped"
        );
    }
}

impl Drop for PerfLogger {
    fn drop(&mut self) {
        self.stop();
    }
}
