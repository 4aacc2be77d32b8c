// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Vessel Performance Logger
//!
//! Samples live navigation and wind readings on a fixed period and appends
//! them as CSV rows to a rotating log file. Retired files are compressed by
//! an external program (gzip by default) in the background, and a file left
//! active by an unclean shutdown is compressed on the next startup.
//!
//! # Quick Start
//!
//! ```bash
//! # Feed Signal K deltas on stdin, log every 5 minutes, rotate hourly
//! signalk-delta-source | perf-logger --logdir /var/log/perf
//!
//! # Sample every 10 seconds, no periodic rotation
//! perf-logger --logdir ./perf --period 10 --interval 0
//! ```
//!
//! # Files
//!
//! | File | Content |
//! |------|---------|
//! | `perf-data.<time>.log` | header line, then one row per sample |
//! | `perf-data.<time>.log.gz` | retired file, compressed |
//! | `.current_log_file` | name of the active file |
//!
//! # Example
//!
//! ```rust,ignore
//! use perf_logger::{PerfLogger, PerfLoggerConfig, SignalKModel, TracingStatus};
//! use std::sync::Arc;
//!
//! let model = Arc::new(SignalKModel::new("vessels.self"));
//! let config = PerfLoggerConfig::new("/var/log/perf").sample_period_secs(60);
//! let mut logger = PerfLogger::start(config, model.clone(), Arc::new(TracingStatus))?;
//!
//! model.apply_delta_str(r#"{"updates":[{"values":[{"path":"navigation.speedOverGround","value":5.0}]}]}"#)?;
//! // ...
//! logger.stop();
//! ```

pub mod compress;
pub mod config;
pub mod rotation;
pub mod row;
pub mod sampler;
pub mod service;
pub mod source;
pub mod status;
pub mod writer;

pub use compress::{Compressor, ExternalCompressor};
pub use config::{ConfigError, PerfLoggerConfig};
pub use rotation::{RotationError, RotationManager, RotationState};
pub use row::{Column, PerfRow, RowSettings, COLUMNS, HEADER};
pub use sampler::Sampler;
pub use service::{LoggerStats, PerfLogger, StartError};
pub use source::{Position, Reading, ReadingSource, ReadingValue, SignalKModel, Snapshot};
pub use status::{StatusSink, TracingStatus};
pub use writer::LogWriter;
