// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Cached listing of the videos played on the display screens.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::MediaConfig;

#[derive(Debug, Default)]
struct MediaState {
    files: Vec<String>,
    last_scan: Option<Instant>,
}

pub struct MediaLibrary {
    dir: PathBuf,
    url_prefix: String,
    extensions: Vec<String>,
    refresh: Duration,
    state: Mutex<MediaState>,
}

impl MediaLibrary {
    pub fn new(cfg: &MediaConfig) -> Self {
        Self {
            dir: PathBuf::from(cfg.dir.trim()),
            url_prefix: cfg.url_prefix.trim_end_matches('/').to_string(),
            extensions: cfg
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            refresh: Duration::from_secs(cfg.refresh_secs),
            state: Mutex::new(MediaState::default()),
        }
    }

    /// Media URLs, rescanning first when the cached listing is stale.
    pub fn list(&self) -> Vec<String> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let stale = state
            .last_scan
            .map(|at| at.elapsed() >= self.refresh)
            .unwrap_or(true);
        if stale {
            state.files = self.scan();
            state.last_scan = Some(Instant::now());
        }
        state.files.clone()
    }

    fn scan(&self) -> Vec<String> {
        if !self.dir.exists() {
            warn!("Media folder {} does not exist", self.dir.display());
            return Vec::new();
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error scanning media folder {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_media_file(path))
            .filter_map(|path| path.file_name().and_then(OsStr::to_str).map(str::to_string))
            .collect();
        names.sort();

        info!("Found {} media files", names.len());
        names
            .into_iter()
            .map(|name| format!("{}/{}", self.url_prefix, name))
            .collect()
    }

    fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}
