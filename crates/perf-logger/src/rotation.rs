// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Active log file rotation.
//!
//! The [`RotationManager`] owns the name of the active file, the
//! `.current_log_file` metadata record and the transitions between files:
//!
//! ```text
//! NoActiveFile --startup--> Active(a) --rotate--> Active(b) --shutdown--> Stopped
//! ```
//!
//! Naming, header and record update happen under one lock, and row appends
//! take the same lock, so no row can land in a file that was already retired.

use crate::compress::Compressor;
use crate::writer::LogWriter;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, SubsecRound, Utc};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Active file name prefix.
pub const FILE_PREFIX: &str = "perf-data.";

/// Active file name suffix.
pub const FILE_SUFFIX: &str = ".log";

/// Metadata record holding the active file name.
pub const METADATA_FILE: &str = ".current_log_file";

/// Log file name for a rotation timestamp: `perf-data.<ISO8601, ':' -> '-'>.log`.
pub fn log_file_name(time: DateTime<Utc>) -> String {
    let stamp = time
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "-");
    format!("{}{}{}", FILE_PREFIX, stamp, FILE_SUFFIX)
}

/// Rotation errors.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No active log file")]
    NoActiveFile,

    #[error("Already started")]
    AlreadyStarted,

    #[error("Rotation stopped")]
    Stopped,
}

/// Rotation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationState {
    NoActiveFile,
    Active(String),
    Stopped,
}

/// Result of the startup transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupOutcome {
    /// Newly opened active file.
    pub active: String,
    /// Leftover file submitted for recovery compression.
    pub recovered: Option<String>,
}

/// Result of a scheduled rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Newly opened active file.
    pub active: String,
    /// Retired file submitted for compression.
    pub retired: String,
}

struct Inner {
    state: RotationState,
    last_rotation: Option<DateTime<Utc>>,
    /// The active file has no header yet; written before the first row.
    header_pending: bool,
}

/// Owner of the active file identity.
pub struct RotationManager {
    writer: LogWriter,
    compressor: Arc<dyn Compressor>,
    inner: Mutex<Inner>,
}

impl RotationManager {
    pub fn new(writer: LogWriter, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            writer,
            compressor,
            inner: Mutex::new(Inner {
                state: RotationState::NoActiveFile,
                last_rotation: None,
                header_pending: false,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> RotationState {
        self.lock().state.clone()
    }

    /// Name of the active file, if any.
    pub fn active_file(&self) -> Option<String> {
        match &self.lock().state {
            RotationState::Active(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// The log writer used for all files.
    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }

    /// Read the metadata record. A missing or empty record is `None`.
    pub fn read_metadata(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.writer.path_of(METADATA_FILE)) {
            Ok(content) => {
                let name = content.trim();
                Ok(if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Recover a leftover active file, then open the first active file.
    pub fn startup(&self, now: DateTime<Utc>) -> Result<StartupOutcome, RotationError> {
        let mut inner = self.lock();
        if inner.state != RotationState::NoActiveFile {
            return Err(RotationError::AlreadyStarted);
        }

        let stamp = next_stamp(inner.last_rotation, now);
        let next_name = log_file_name(stamp);

        let recorded = self.read_metadata().unwrap_or_else(|e| {
            tracing::warn!("Unable to read {}: {}", METADATA_FILE, e);
            None
        });
        let recovered = recorded.filter(|name| {
            is_plain_file_name(name) && *name != next_name && self.writer.path_of(name).is_file()
        });

        if let Some(ref name) = recovered {
            tracing::info!(file = %name, "compressing leftover log file");
            self.compressor.submit(&self.writer.path_of(name));
        }

        self.open_locked(&mut inner, stamp, next_name.clone());

        Ok(StartupOutcome {
            active: next_name,
            recovered,
        })
    }

    /// Open a new active file and submit the outgoing one for compression.
    pub fn rotate(&self, now: DateTime<Utc>) -> Result<RotationOutcome, RotationError> {
        let (retired, active) = {
            let mut inner = self.lock();
            let outgoing = match &inner.state {
                RotationState::Active(name) => name.clone(),
                RotationState::NoActiveFile => return Err(RotationError::NoActiveFile),
                RotationState::Stopped => return Err(RotationError::Stopped),
            };
            let stamp = next_stamp(inner.last_rotation, now);
            let name = log_file_name(stamp);
            self.open_locked(&mut inner, stamp, name.clone());
            (outgoing, name)
        };

        // The outgoing file can no longer receive rows.
        self.compressor.submit(&self.writer.path_of(&retired));

        tracing::info!(active = %active, retired = %retired, "rotated log file");
        Ok(RotationOutcome { active, retired })
    }

    /// Final rotation: retire and compress the active file without opening
    /// a new one, and remove the metadata record.
    ///
    /// Returns the retired file name. Calling it again is a no-op.
    pub fn shutdown(&self) -> Option<String> {
        let retired = {
            let mut inner = self.lock();
            let previous = std::mem::replace(&mut inner.state, RotationState::Stopped);
            match previous {
                RotationState::Active(name) => name,
                _ => return None,
            }
        };

        if let Err(e) = std::fs::remove_file(self.writer.path_of(METADATA_FILE)) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Unable to remove {}: {}", METADATA_FILE, e);
            }
        }
        self.compressor.submit(&self.writer.path_of(&retired));

        tracing::info!(retired = %retired, "closed final log file");
        Some(retired)
    }

    /// Append a formatted row to the active file.
    ///
    /// A header that could not be written at rotation time is retried
    /// first; the row is refused while the header is still missing.
    pub fn append_row(&self, line: &str) -> Result<(), RotationError> {
        let mut inner = self.lock();
        let name = match &inner.state {
            RotationState::Active(name) => name.clone(),
            RotationState::NoActiveFile => return Err(RotationError::NoActiveFile),
            RotationState::Stopped => return Err(RotationError::Stopped),
        };

        if inner.header_pending {
            self.writer.write_header(&name)?;
            inner.header_pending = false;
            tracing::debug!(file = %name, "header written late");
        }
        self.writer.append_line(&name, line)?;
        Ok(())
    }

    /// Name, header, record. Header and record failures are logged and the
    /// rotation still moves forward; a missing header is retried by
    /// [`append_row`](Self::append_row).
    fn open_locked(&self, inner: &mut Inner, stamp: DateTime<Utc>, name: String) {
        inner.header_pending = match self.writer.write_header(&name) {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!(file = %name, "Unable to write header: {}", e);
                true
            }
        };
        if let Err(e) = std::fs::write(self.writer.path_of(METADATA_FILE), &name) {
            tracing::warn!("Unable to update {}: {}", METADATA_FILE, e);
        }
        tracing::debug!(file = %name, "opened log file");
        inner.state = RotationState::Active(name);
        inner.last_rotation = Some(stamp);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Rotation timestamps strictly increase at file name resolution (ms),
/// even if the clock does not.
fn next_stamp(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(3);
    match last {
        Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
        _ => now,
    }
}

/// The record must name a file directly inside the log directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && name != METADATA_FILE
}
