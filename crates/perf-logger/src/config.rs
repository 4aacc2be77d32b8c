// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger configuration.
//!
//! Supplied once at startup (YAML file and/or CLI flags), validated once,
//! never hot-reloaded.

use crate::row::RowSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default rotation interval in seconds.
pub const DEFAULT_ROTATION_INTERVAL_SECS: i64 = 3600;

/// Default sampling period in seconds.
pub const DEFAULT_SAMPLE_PERIOD_SECS: u64 = 300;

/// Default subscription context.
pub const DEFAULT_CONTEXT: &str = "vessels.self";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log directory not defined")]
    MissingLogDir,

    #[error("Sampling period must be greater than zero")]
    InvalidPeriod,

    #[error("Compressor command is empty")]
    EmptyCompressor,

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Performance logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerfLoggerConfig {
    /// Directory for active, rotated and compressed files.
    #[serde(rename = "logdir")]
    pub log_dir: Option<PathBuf>,

    /// Rotation interval in seconds (<= 0 disables periodic rotation).
    #[serde(rename = "interval")]
    pub rotation_interval_secs: i64,

    /// Sampling period in seconds, also the staleness threshold.
    #[serde(rename = "period")]
    pub sample_period_secs: u64,

    /// Subscription context handed to the reading source.
    pub context: String,

    /// Own vessel URN context (`vessels.urn:mrn:...`), stored as `context`.
    pub self_urn: Option<String>,

    /// Vessel model, copied into every row.
    pub model: String,

    /// Sail configuration, copied into every row.
    pub sail_config: String,

    /// Engine state, copied into every row.
    pub engine: String,

    /// Compressor program and leading arguments; the file path is appended.
    pub compressor: Vec<String>,

    /// Trace every written row through the status channel.
    pub trace_rows: bool,

    /// How long `stop` waits for outstanding compressions (0 = no wait).
    pub shutdown_grace_ms: u64,
}

impl Default for PerfLoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            rotation_interval_secs: DEFAULT_ROTATION_INTERVAL_SECS,
            sample_period_secs: DEFAULT_SAMPLE_PERIOD_SECS,
            context: DEFAULT_CONTEXT.to_string(),
            self_urn: None,
            model: "unknown".to_string(),
            sail_config: "main+jib".to_string(),
            engine: "off".to_string(),
            compressor: vec!["gzip".to_string()],
            trace_rows: false,
            shutdown_grace_ms: 0,
        }
    }
}

impl PerfLoggerConfig {
    /// Create a config with defaults for the given log directory.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        Self {
            log_dir: Some(log_dir.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Set rotation interval in seconds.
    pub fn rotation_interval_secs(mut self, secs: i64) -> Self {
        self.rotation_interval_secs = secs;
        self
    }

    /// Set sampling period in seconds.
    pub fn sample_period_secs(mut self, secs: u64) -> Self {
        self.sample_period_secs = secs;
        self
    }

    /// Set subscription context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the own vessel URN context.
    pub fn self_urn(mut self, urn: impl Into<String>) -> Self {
        self.self_urn = Some(urn.into());
        self
    }

    /// Set vessel model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set sail configuration.
    pub fn sail_config(mut self, sail_config: impl Into<String>) -> Self {
        self.sail_config = sail_config.into();
        self
    }

    /// Set engine state.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Set compressor command.
    pub fn compressor<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compressor = command.into_iter().map(Into::into).collect();
        self
    }

    /// Enable per-row debug traces.
    pub fn trace_rows(mut self, enabled: bool) -> Self {
        self.trace_rows = enabled;
        self
    }

    /// Set the shutdown grace period in milliseconds.
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.shutdown_grace_ms = ms;
        self
    }

    /// Check every field once; called by the service before anything starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_dir.is_none() {
            return Err(ConfigError::MissingLogDir);
        }
        if self.sample_period_secs == 0 {
            return Err(ConfigError::InvalidPeriod);
        }
        if self.compressor.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyCompressor);
        }
        if self.context.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "context",
                reason: "must not be empty",
            });
        }
        check_row_string("model", &self.model)?;
        check_row_string("sail_config", &self.sail_config)?;
        check_row_string("engine", &self.engine)?;
        Ok(())
    }

    /// Rotation interval, `None` when periodic rotation is disabled.
    pub fn rotation_interval(&self) -> Option<Duration> {
        if self.rotation_interval_secs > 0 {
            Some(Duration::from_secs(self.rotation_interval_secs as u64))
        } else {
            None
        }
    }

    /// Sampling period.
    pub fn sample_period(&self) -> Duration {
        Duration::from_secs(self.sample_period_secs)
    }

    /// Best-effort wait for compressions at shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Static strings copied into every row.
    pub fn row_settings(&self) -> RowSettings {
        RowSettings {
            model: self.model.clone(),
            sail_config: self.sail_config.clone(),
            engine: self.engine.clone(),
        }
    }
}

/// Static row strings must not break the line or column structure.
fn check_row_string(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must not be empty",
        });
    }
    if value.contains([crate::row::DELIMITER, '\r', '\n']) {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must not contain the delimiter or line breaks",
        });
    }
    Ok(())
}
