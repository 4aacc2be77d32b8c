// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end lifecycle: deltas in, rows and compressed files out.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use perf_logger::rotation::METADATA_FILE;
use perf_logger::{PerfLogger, PerfLoggerConfig, SignalKModel, StatusSink, HEADER};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct CollectingStatus {
    messages: Mutex<Vec<String>>,
}

impl StatusSink for CollectingStatus {
    fn set_status(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn gzip_available() -> bool {
    Command::new("gzip")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn delta(age: ChronoDuration) -> String {
    let ts = (Utc::now() - age).to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        r#"{{"context":"vessels.self","updates":[{{"timestamp":"{ts}","values":[
            {{"path":"navigation.datetime","value":"{ts}"}},
            {{"path":"navigation.position","value":{{"latitude":60.15,"longitude":24.95}}}},
            {{"path":"navigation.speedOverGround","value":5.0}},
            {{"path":"environment.wind.angleApparent","value":0.5}}
        ]}}]}}"#,
        ts = ts
    )
    .replace('\n', "")
}

#[cfg(unix)]
#[test]
fn fresh_and_stale_ticks() {
    let temp_dir = TempDir::new().unwrap();
    let model = Arc::new(SignalKModel::new("vessels.self"));
    let status = Arc::new(CollectingStatus::default());

    let config = PerfLoggerConfig::new(temp_dir.path())
        .compressor(["true"])
        .model("first-40");
    let mut logger = PerfLogger::start(config, model.clone(), status.clone()).unwrap();
    let active = logger.active_file().unwrap();

    // Ten minutes old with a five minute period: nothing written.
    model.apply_delta_str(&delta(ChronoDuration::minutes(10))).unwrap();
    assert!(!logger.sample_now());

    model.apply_delta_str(&delta(ChronoDuration::seconds(2))).unwrap();
    assert!(logger.sample_now());

    let content = std::fs::read_to_string(temp_dir.path().join(&active)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], HEADER);

    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields.len(), 12);
    assert_eq!(fields[1], "first-40");
    assert_eq!(fields[3], "24.950000");
    assert_eq!(fields[4], "60.150000");
    assert_eq!(fields[5], "9.72");
    assert_eq!(fields[6], "");
    assert_eq!(fields[9], "28.6");

    logger.stop();
    assert!(status.messages.lock().unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn gzip_compresses_retired_and_recovered_files() {
    if !gzip_available() {
        eprintln!("gzip not available, skipping");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let leftover = "perf-data.2020-01-01T00-00-00.000Z.log";
    std::fs::write(temp_dir.path().join(leftover), format!("{}\n", HEADER)).unwrap();
    std::fs::write(temp_dir.path().join(METADATA_FILE), leftover).unwrap();

    let model = Arc::new(SignalKModel::new("vessels.self"));
    let status = Arc::new(CollectingStatus::default());
    let config = PerfLoggerConfig::new(temp_dir.path()).shutdown_grace_ms(10_000);
    let mut logger = PerfLogger::start(config, model, status.clone()).unwrap();

    let first = logger.active_file().unwrap();
    assert!(logger.rotate_now());
    let second = logger.active_file().unwrap();
    logger.stop();

    for name in [leftover, first.as_str(), second.as_str()] {
        let gz = temp_dir.path().join(format!("{}.gz", name));
        assert!(gz.exists(), "{} was not compressed", name);
        assert!(!temp_dir.path().join(name).exists());
    }
    assert!(!temp_dir.path().join(METADATA_FILE).exists());
    assert!(status.messages.lock().unwrap().is_empty());
    assert_eq!(logger.stats().compressions_submitted, 3);
}

#[cfg(unix)]
#[test]
fn failing_compressor_is_reported_and_file_kept() {
    let temp_dir = TempDir::new().unwrap();
    let model = Arc::new(SignalKModel::new("vessels.self"));
    let status = Arc::new(CollectingStatus::default());
    let config = PerfLoggerConfig::new(temp_dir.path())
        .compressor(["false"])
        .shutdown_grace_ms(10_000);

    let mut logger = PerfLogger::start(config, model, status.clone()).unwrap();
    let first = logger.active_file().unwrap();
    assert!(logger.rotate_now());
    logger.stop();

    assert!(temp_dir.path().join(&first).exists());
    let messages = status.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .any(|m| m.contains(&first) && m.contains("exit code 1")));
}

#[cfg(unix)]
#[test]
fn periodic_workers_sample_and_rotate() {
    let temp_dir = TempDir::new().unwrap();
    let model = Arc::new(SignalKModel::new("vessels.self"));
    model.apply_delta_str(&delta(ChronoDuration::zero())).unwrap();

    let config = PerfLoggerConfig::new(temp_dir.path())
        .sample_period_secs(1)
        .rotation_interval_secs(2)
        .compressor(["true"]);
    let mut logger = PerfLogger::start(config, model.clone(), Arc::new(CollectingStatus::default()))
        .unwrap();

    for _ in 0..40 {
        model.apply_delta_str(&delta(ChronoDuration::zero())).unwrap();
        std::thread::sleep(Duration::from_millis(100));
    }
    logger.stop();

    let stats = logger.stats();
    assert!(stats.rows_written >= 1, "{:?}", stats);
    assert!(stats.rotations >= 2, "{:?}", stats);
    assert_eq!(stats.write_errors, 0);
}
