// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host status channel.
//!
//! The host exposes a single "set status message" call. Fatal startup
//! failures and compression failures go through it; per-row traces use
//! the optional debug hook.

/// Status/log callback exposed by the host application.
pub trait StatusSink: Send + Sync {
    /// Publish a human-readable status message.
    fn set_status(&self, message: &str);

    /// Emit a debug trace (off unless row tracing is enabled).
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

/// Status sink that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn set_status(&self, message: &str) {
        tracing::warn!(target: "perf_logger::status", "{}", message);
    }
}
