// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live reading source.
//!
//! The host exposes "get current value at path". [`SignalKModel`] is an
//! in-memory implementation fed from Signal K delta messages.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Value carried by a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Number(f64),
    Position(Position),
    Text(String),
}

/// Most recently known value at a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: ReadingValue,
    /// Generation time reported by the source, if any.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn number(value: f64) -> Self {
        Self {
            value: ReadingValue::Number(value),
            timestamp: None,
        }
    }

    pub fn position(latitude: f64, longitude: f64) -> Self {
        Self {
            value: ReadingValue::Position(Position {
                latitude,
                longitude,
            }),
            timestamp: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: ReadingValue::Text(value.into()),
            timestamp: None,
        }
    }

    /// Attach a generation timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            ReadingValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Position> {
        match self.value {
            ReadingValue::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ReadingValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Readings captured at one instant, keyed by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    readings: HashMap<String, Reading>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading (builder style, mostly for tests and adapters).
    pub fn with(mut self, path: impl Into<String>, reading: Reading) -> Self {
        self.readings.insert(path.into(), reading);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, reading: Reading) {
        self.readings.insert(path.into(), reading);
    }

    pub fn get(&self, path: &str) -> Option<&Reading> {
        self.readings.get(path)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Host adapter returning the latest known value at a path.
///
/// Implementations must not block on network or disk I/O.
pub trait ReadingSource: Send + Sync {
    /// Current value at `path` within `context`, or `None` if unknown.
    fn get(&self, context: &str, path: &str) -> Option<Reading>;

    /// Capture several paths at once.
    fn snapshot(&self, context: &str, paths: &[&str]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for path in paths {
            if let Some(reading) = self.get(context, path) {
                snapshot.insert(*path, reading);
            }
        }
        snapshot
    }
}

/// Delta ingestion errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Delta has no 'updates' array")]
    NoUpdates,
}

/// In-memory Signal K model, updated from deltas.
pub struct SignalKModel {
    self_context: String,
    aliases: HashMap<String, String>,
    contexts: RwLock<HashMap<String, HashMap<String, Reading>>>,
}

impl SignalKModel {
    /// Create an empty model; deltas without a context go to `self_context`.
    pub fn new(self_context: impl Into<String>) -> Self {
        Self {
            self_context: self_context.into(),
            aliases: HashMap::new(),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Store deltas addressed to `context` under `target` instead.
    ///
    /// Servers address the own vessel by its URN
    /// (`vessels.urn:mrn:imo:mmsi:...`), not by `vessels.self`.
    pub fn with_alias(mut self, context: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(context.into(), target.into());
        self
    }

    /// Set a single reading directly.
    pub fn set(&self, context: &str, path: &str, reading: Reading) {
        let mut contexts = self.contexts.write().unwrap_or_else(|e| e.into_inner());
        contexts
            .entry(context.to_string())
            .or_default()
            .insert(path.to_string(), reading);
    }

    /// Parse and apply one delta line.
    pub fn apply_delta_str(&self, line: &str) -> Result<usize, SourceError> {
        let delta: serde_json::Value = serde_json::from_str(line)?;
        self.apply_delta(&delta)
    }

    /// Apply a Signal K delta, returning the number of paths touched.
    ///
    /// Numbers, `{latitude, longitude}` objects and strings are stored,
    /// `null` clears the path, anything else is ignored.
    pub fn apply_delta(&self, delta: &serde_json::Value) -> Result<usize, SourceError> {
        let updates = delta
            .get("updates")
            .and_then(|u| u.as_array())
            .ok_or(SourceError::NoUpdates)?;
        let context = delta
            .get("context")
            .and_then(|c| c.as_str())
            .unwrap_or(self.self_context.as_str());
        let context = self
            .aliases
            .get(context)
            .map_or(context, String::as_str)
            .to_string();

        let mut touched = 0;
        let mut contexts = self.contexts.write().unwrap_or_else(|e| e.into_inner());
        let paths = contexts.entry(context).or_default();

        for update in updates {
            let timestamp = update
                .get("timestamp")
                .and_then(|t| t.as_str())
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc));

            let Some(values) = update.get("values").and_then(|v| v.as_array()) else {
                continue;
            };

            for entry in values {
                let Some(path) = entry.get("path").and_then(|p| p.as_str()) else {
                    continue;
                };
                let value = match entry.get("value") {
                    Some(value) if !value.is_null() => value,
                    _ => {
                        if paths.remove(path).is_some() {
                            touched += 1;
                        }
                        continue;
                    }
                };
                if let Some(value) = json_to_reading_value(value) {
                    paths.insert(path.to_string(), Reading { value, timestamp });
                    touched += 1;
                } else {
                    tracing::trace!(path, "ignoring unsupported delta value");
                }
            }
        }

        Ok(touched)
    }
}

impl ReadingSource for SignalKModel {
    fn get(&self, context: &str, path: &str) -> Option<Reading> {
        let contexts = self.contexts.read().unwrap_or_else(|e| e.into_inner());
        contexts.get(context)?.get(path).cloned()
    }

    fn snapshot(&self, context: &str, paths: &[&str]) -> Snapshot {
        // One read lock for the whole capture.
        let contexts = self.contexts.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshot = Snapshot::new();
        if let Some(readings) = contexts.get(context) {
            for path in paths {
                if let Some(reading) = readings.get(*path) {
                    snapshot.insert(*path, reading.clone());
                }
            }
        }
        snapshot
    }
}

fn json_to_reading_value(value: &serde_json::Value) -> Option<ReadingValue> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(ReadingValue::Number),
        serde_json::Value::String(s) => Some(ReadingValue::Text(s.clone())),
        serde_json::Value::Object(obj) => {
            let latitude = obj.get("latitude")?.as_f64()?;
            let longitude = obj.get("longitude")?.as_f64()?;
            Some(ReadingValue::Position(Position {
                latitude,
                longitude,
            }))
        }
        _ => None,
    }
}
