// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rotation, recovery and concurrency scenarios against a real directory.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use perf_logger::rotation::{log_file_name, METADATA_FILE};
use perf_logger::{Compressor, LogWriter, RotationManager, HEADER};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records each job together with what the directory looked like at submit time.
#[derive(Default)]
struct SnoopingCompressor {
    jobs: Mutex<Vec<(PathBuf, u64, Vec<String>)>>,
}

impl SnoopingCompressor {
    fn jobs(&self) -> Vec<(PathBuf, u64, Vec<String>)> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Compressor for SnoopingCompressor {
    fn submit(&self, path: &Path) {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let mut listing: Vec<String> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        listing.sort();
        self.jobs
            .lock()
            .unwrap()
            .push((path.to_path_buf(), size, listing));
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn setup(dir: &Path) -> (Arc<RotationManager>, Arc<SnoopingCompressor>) {
    let compressor = Arc::new(SnoopingCompressor::default());
    let manager = Arc::new(RotationManager::new(
        LogWriter::new(dir),
        compressor.clone(),
    ));
    (manager, compressor)
}

#[test]
fn scenario_a_startup_in_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, compressor) = setup(temp_dir.path());

    let outcome = manager.startup(t0()).unwrap();
    let expected = log_file_name(t0());
    assert_eq!(outcome.active, expected);

    let content = std::fs::read_to_string(temp_dir.path().join(&expected)).unwrap();
    assert_eq!(
        content,
        "time,model,config,lon,lat,sog,cog,stw,aws,awa,dbk,engine\n"
    );
    let record = std::fs::read_to_string(temp_dir.path().join(METADATA_FILE)).unwrap();
    assert_eq!(record, expected);
    assert!(compressor.jobs().is_empty());
}

#[test]
fn scenario_d_rotation_replaces_active_file() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, compressor) = setup(temp_dir.path());

    let a = manager.startup(t0()).unwrap().active;
    let outcome = manager.rotate(t0() + ChronoDuration::hours(1)).unwrap();
    let b = outcome.active.clone();

    assert_eq!(outcome.retired, a);
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join(&b)).unwrap(),
        format!("{}\n", HEADER)
    );
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join(METADATA_FILE)).unwrap(),
        b
    );

    let jobs = compressor.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].0, temp_dir.path().join(&a));
    // The replacement was already in place when the job was submitted.
    assert!(jobs[0].2.contains(&b));
}

#[test]
fn recovery_is_submitted_before_new_header() {
    let temp_dir = TempDir::new().unwrap();
    let leftover = log_file_name(t0() - ChronoDuration::days(1));
    std::fs::write(temp_dir.path().join(&leftover), format!("{}\nrow\n", HEADER)).unwrap();
    std::fs::write(temp_dir.path().join(METADATA_FILE), &leftover).unwrap();

    let (manager, compressor) = setup(temp_dir.path());
    let outcome = manager.startup(t0()).unwrap();

    let jobs = compressor.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].0, temp_dir.path().join(&leftover));
    assert!(
        !jobs[0].2.contains(&outcome.active),
        "new active file existed before recovery was submitted"
    );
    assert_eq!(manager.read_metadata().unwrap(), Some(outcome.active));
}

#[test]
fn no_recovery_without_record() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(log_file_name(t0())), "stray\n").unwrap();

    let (manager, compressor) = setup(temp_dir.path());
    manager.startup(t0() + ChronoDuration::seconds(1)).unwrap();
    assert!(compressor.jobs().is_empty());
}

#[test]
fn n_rotations_give_n_plus_one_increasing_names() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, compressor) = setup(temp_dir.path());

    let n = 7;
    let mut names = vec![manager.startup(t0()).unwrap().active];
    for i in 1..=n {
        let name = manager.rotate(t0() + ChronoDuration::seconds(i * 60)).unwrap().active;
        manager.append_row(&format!("row-{}\n", i)).unwrap();
        names.push(name);
    }

    assert_eq!(names.len(), n as usize + 1);
    for pair in names.windows(2) {
        assert!(pair[0] < pair[1]);
    }

    for name in &names[1..] {
        let content = std::fs::read_to_string(temp_dir.path().join(name)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.iter().filter(|l| **l == HEADER).count(), 1);
        assert_eq!(lines.len(), 2);
    }

    let retired: Vec<PathBuf> = compressor.jobs().into_iter().map(|j| j.0).collect();
    let expected: Vec<PathBuf> = names[..n as usize]
        .iter()
        .map(|n| temp_dir.path().join(n))
        .collect();
    assert_eq!(retired, expected);
}

#[test]
fn concurrent_rotation_never_writes_into_retired_file() {
    let temp_dir = TempDir::new().unwrap();
    let (manager, compressor) = setup(temp_dir.path());
    manager.startup(t0()).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                for i in 0..200 {
                    manager.append_row(&format!("w{}-{}\n", w, i)).unwrap();
                }
            })
        })
        .collect();

    let rotator = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || {
            for i in 1..=50 {
                manager
                    .rotate(t0() + ChronoDuration::milliseconds(i))
                    .unwrap();
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    rotator.join().unwrap();

    let jobs = compressor.jobs();
    assert_eq!(jobs.len(), 50);
    let mut total_rows = 0;
    for (path, size_at_submit, _) in &jobs {
        let size_now = std::fs::metadata(path).unwrap().len();
        assert_eq!(size_now, *size_at_submit, "{} grew after retirement", path.display());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with(HEADER));
        total_rows += content.lines().count() - 1;
    }

    let active = manager.active_file().unwrap();
    let content = std::fs::read_to_string(temp_dir.path().join(active)).unwrap();
    total_rows += content.lines().count() - 1;
    assert_eq!(total_rows, 800);
}
