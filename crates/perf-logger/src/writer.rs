// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only writer for log files inside the log directory.

use crate::row::header_line;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Appends lines to files in a log directory.
///
/// Every call opens the file in append mode, so a file removed or
/// compressed behind our back is simply recreated.
#[derive(Debug, Clone)]
pub struct LogWriter {
    dir: PathBuf,
}

impl LogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a file in the log directory.
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Append `line` (which carries its own newline) and flush to the OS.
    pub fn append_line(&self, file_name: &str, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_of(file_name))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    /// Append the column header line.
    pub fn write_header(&self, file_name: &str) -> io::Result<()> {
        self.append_line(file_name, &header_line())
    }
}
