// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "QMS_CONFIG";

const CONFIG_FILE_NAME: &str = "qms.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),

    #[error("Config file {0} has no [{1}] section")]
    MissingSection(PathBuf, &'static str),
}

/// Candidate config files, most specific first.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(4);
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("qms").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/qms").join(CONFIG_FILE_NAME));
    paths
}

/// Parse one `[key]` table out of a TOML document. `Ok(None)` means the
/// table is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let parse_error = |e: toml::de::Error| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let mut table: toml::Table = toml::from_str(content).map_err(parse_error)?;
    match table.remove(key) {
        Some(section) => section.try_into::<T>().map(Some).map_err(parse_error),
        None => Ok(None),
    }
}

fn read_section<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
    parse_section(path, &content, key)
}

/// A struct that lives in its own table of `qms.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Table name, e.g. `"qms-server"`.
    fn section_key() -> &'static str;

    /// Load from an explicit file; the section must be present.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        read_section::<Self>(path, Self::section_key())?
            .ok_or_else(|| ConfigError::MissingSection(path.to_path_buf(), Self::section_key()))
    }

    /// Load from the first existing candidate that carries the section.
    fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in paths.iter().filter(|p| p.is_file()) {
            if let Some(cfg) = read_section::<Self>(path, Self::section_key())? {
                return Ok((cfg, Some(path.clone())));
            }
        }
        Ok((Self::default(), None))
    }

    /// Search `$QMS_CONFIG`, `./qms.toml`, the user config dir, then `/etc/qms`.
    /// Falls back to defaults when nothing is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_from_paths(&config_search_paths())
    }
}

/// Check a `[general].log_level` value.
pub fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}
