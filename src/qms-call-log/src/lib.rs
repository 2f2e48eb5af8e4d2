// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Durable call log.
//!
//! Provides [`CallLogConfig`] for TOML configuration and [`CallLog`] for
//! appending every call to a CSV file and reading it back by recency or date.

use std::collections::BTreeMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use qms_core::CallRecord;

/// Column names, written once at the top of an empty log.
pub const HEADER: [&str; 6] = ["timestamp", "date", "time", "number", "counter", "day_of_week"];

/// Upper bound on rows returned by a single recency query.
pub const MAX_RECENT: usize = 100;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Call log location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallLogConfig {
    /// Directory holding the log file
    pub dir: String,
    /// Log file name inside `dir`
    pub file: String,
}

impl Default for CallLogConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            file: "call_logs.csv".to_string(),
        }
    }
}

impl CallLogConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.dir.trim()).join(self.file.trim())
    }
}

#[derive(Debug, Error)]
pub enum CallLogError {
    #[error("create call log dir '{0}': {1}")]
    CreateDir(PathBuf, io::Error),
    #[error("open call log '{0}': {1}")]
    Open(PathBuf, io::Error),
    #[error("write call log header to '{0}': {1}")]
    WriteHeader(PathBuf, csv::Error),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One persisted call, with columns derived from its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRow {
    pub timestamp: String,
    pub date: String,
    pub time: String,
    pub number: String,
    pub counter: String,
    pub day_of_week: String,
}

impl From<&CallRecord> for CallRow {
    fn from(record: &CallRecord) -> Self {
        Self {
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            date: record.date_string(),
            time: record.time_string(),
            number: record.number.clone(),
            counter: record.counter.clone(),
            day_of_week: record.timestamp.format("%A").to_string(),
        }
    }
}

/// Aggregates served by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallLogStats {
    pub date: String,
    pub total_calls: usize,
    pub counter_usage: BTreeMap<String, usize>,
    pub recent_total: usize,
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Append-only CSV log of every accepted call.
pub struct CallLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CallLog {
    /// Open the log described by `cfg`, creating directory and header as needed.
    pub fn from_config(cfg: &CallLogConfig) -> Result<Self, CallLogError> {
        Self::open(cfg.path())
    }

    /// Open (or create) the log at `path`.
    ///
    /// The header is written only when the file is missing or empty. Failing
    /// to create the directory or open the file for append is fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CallLogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                create_dir_all(parent)
                    .map_err(|e| CallLogError::CreateDir(parent.to_path_buf(), e))?;
                info!("Created call log directory: {}", parent.display());
            }
        }

        let file = open_append(&path).map_err(|e| CallLogError::Open(path.clone(), e))?;
        let is_empty = file
            .metadata()
            .map_err(|e| CallLogError::Open(path.clone(), e))?
            .len()
            == 0;
        if is_empty {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer
                .write_record(HEADER)
                .map_err(|e| CallLogError::WriteHeader(path.clone(), e))?;
            writer
                .flush()
                .map_err(|e| CallLogError::WriteHeader(path.clone(), e.into()))?;
            info!("Created call log with headers: {}", path.display());
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one call. Failures are logged and reported as `false`.
    pub fn append(&self, record: &CallRecord) -> bool {
        let row = CallRow::from(record);
        let Ok(_guard) = self.write_lock.lock() else {
            error!("call log mutex poisoned, dropping row for {}", record.number);
            return false;
        };

        match write_row(&self.path, &row) {
            Ok(()) => {
                info!(
                    "Logged call to CSV: {} at {} on {}",
                    row.number, row.counter, row.timestamp
                );
                true
            }
            Err(e) => {
                error!("Failed to log call to CSV '{}': {}", self.path.display(), e);
                false
            }
        }
    }

    /// The last `limit` rows, newest first. Empty when the file is unreadable.
    pub fn recent(&self, limit: usize) -> Vec<CallRow> {
        let mut rows = self.read_rows();
        let start = rows.len().saturating_sub(limit);
        let mut recent = rows.split_off(start);
        recent.reverse();
        recent
    }

    /// All rows whose `date` column equals `date`, in file order.
    pub fn by_date(&self, date: &str) -> Vec<CallRow> {
        self.read_rows()
            .into_iter()
            .filter(|row| row.date == date)
            .collect()
    }

    /// Totals for `date` plus the size of the recent window.
    pub fn stats(&self, date: &str) -> CallLogStats {
        let today = self.by_date(date);
        let mut counter_usage = BTreeMap::new();
        for row in &today {
            *counter_usage.entry(row.counter.clone()).or_insert(0) += 1;
        }
        CallLogStats {
            date: date.to_string(),
            total_calls: today.len(),
            counter_usage,
            recent_total: self.recent(MAX_RECENT).len(),
        }
    }

    fn read_rows(&self) -> Vec<CallRow> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                error!("Failed to read call log '{}': {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let mut rows = Vec::new();
        for (idx, result) in reader.deserialize::<CallRow>().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                // A row still being written by a concurrent append lands here.
                Err(e) => debug!("skipping call log row {}: {}", idx + 1, e),
            }
        }
        rows
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append one row, recreating the file (header first) if it went missing.
fn write_row(path: &Path, row: &CallRow) -> Result<(), csv::Error> {
    let file = open_append(path)?;
    let recreated = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if recreated {
        writer.write_record(HEADER)?;
        info!("Recreated call log with headers: {}", path.display());
    }
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}
