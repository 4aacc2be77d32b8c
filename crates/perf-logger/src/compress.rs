// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fire-and-forget compression of retired log files.
//!
//! The external compressor (gzip by default) replaces the file in place by
//! its own convention. A waiter thread per job inspects the exit status and
//! reports failures; jobs are never retried.

use crate::status::StatusSink;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Compression job submission.
pub trait Compressor: Send + Sync {
    /// Start compressing a closed file without waiting for the result.
    fn submit(&self, path: &Path);

    /// Jobs started but not yet finished.
    fn in_flight(&self) -> usize {
        0
    }

    /// Wait until no job is running, up to `timeout`. Returns `true` when idle.
    fn wait_idle(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Counter of running jobs with a condition variable for waiters.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    fn end(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = match self.idle.wait_timeout(count, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        true
    }
}

/// Compressor running an external program as a detached child process.
pub struct ExternalCompressor {
    program: String,
    args: Vec<String>,
    status: Arc<dyn StatusSink>,
    in_flight: Arc<InFlight>,
    failures: Arc<AtomicU64>,
}

impl ExternalCompressor {
    /// `command[0]` is the program, the rest are leading arguments;
    /// the file path is appended as the last argument.
    pub fn new(command: &[String], status: Arc<dyn StatusSink>) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => ("gzip".to_string(), Vec::new()),
        };
        Self {
            program,
            args,
            status,
            in_flight: Arc::new(InFlight::default()),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Plain `gzip <path>`.
    pub fn gzip(status: Arc<dyn StatusSink>) -> Self {
        Self::new(&["gzip".to_string()], status)
    }

    /// Jobs that failed to spawn or exited unsuccessfully.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn report_failure(status: &dyn StatusSink, failures: &AtomicU64, message: String) {
        failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{}", message);
        status.set_status(&message);
    }
}

impl Compressor for ExternalCompressor {
    fn submit(&self, path: &Path) {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                Self::report_failure(
                    self.status.as_ref(),
                    &self.failures,
                    format!(
                        "Compressing file {} failed: cannot run {}: {}",
                        path.display(),
                        self.program,
                        e
                    ),
                );
                return;
            }
        };

        tracing::debug!(path = %path.display(), pid = child.id(), "compression started");
        self.in_flight.begin();

        let path: PathBuf = path.to_path_buf();
        let status = Arc::clone(&self.status);
        let in_flight = Arc::clone(&self.in_flight);
        let failures = Arc::clone(&self.failures);

        let waiter = std::thread::Builder::new()
            .name("perf-compress".into())
            .spawn(move || {
                match child.wait_with_output() {
                    Ok(output) if output.status.success() => {
                        tracing::debug!(path = %path.display(), "compression finished");
                    }
                    Ok(output) => {
                        let code = output
                            .status
                            .code()
                            .map_or_else(|| "signal".to_string(), |c| c.to_string());
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        let mut message = format!(
                            "Compressing file {} failed with exit code {}",
                            path.display(),
                            code
                        );
                        if !stderr.trim().is_empty() {
                            message.push_str(": ");
                            message.push_str(stderr.trim());
                        }
                        Self::report_failure(status.as_ref(), &failures, message);
                    }
                    Err(e) => {
                        Self::report_failure(
                            status.as_ref(),
                            &failures,
                            format!("Compressing file {} failed: {}", path.display(), e),
                        );
                    }
                }
                in_flight.end();
            });

        if let Err(e) = waiter {
            // The child keeps running; only its exit status goes unobserved.
            tracing::warn!("failed to spawn compression waiter: {}", e);
            self.in_flight.end();
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        self.in_flight.wait_idle(timeout)
    }
}
