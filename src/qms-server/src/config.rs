// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for qms-server.
//!
//! Supports loading configuration from TOML files with the following search order:
//! 1. Path specified via `--config` CLI argument
//! 2. Path in `$QMS_CONFIG`
//! 3. `./qms.toml` (current directory)
//! 4. `~/.config/qms/qms.toml` (XDG config)
//! 5. `/etc/qms/qms.toml` (system-wide)
//!
//! Settings live under a `[qms-server]` table.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use qms_app::{validate_log_level, ConfigError, ConfigFile};
use qms_call_log::CallLogConfig;
use qms_cloud::CloudConfig;
use qms_core::DEFAULT_MAX_CALLS;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// HTTP/WebSocket listener
    pub http: HttpConfig,
    /// Call board behavior
    pub board: BoardConfig,
    /// Durable call log
    pub call_log: CallLogConfig,
    /// Display media directory
    pub media: MediaConfig,
    /// Cloud mirror and push notifications
    pub cloud: CloudConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address
    pub listen: IpAddr,
    /// Listen port
    pub port: u16,
    /// Value sent as `Access-Control-Allow-Origin`
    pub cors_origins: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            cors_origins: "*".to_string(),
        }
    }
}

/// Call board settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Calls kept in memory (current + history)
    pub max_calls: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
        }
    }
}

/// Media directory served to the display screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory scanned for video files
    pub dir: String,
    /// URL prefix prepended to each file name
    pub url_prefix: String,
    /// Seconds before a listing is considered stale
    pub refresh_secs: u64,
    /// Accepted file extensions (case-insensitive, without dot)
    pub extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: "static/media".to_string(),
            url_prefix: "/static/media".to_string(),
            refresh_secs: 300,
            extensions: vec!["mp4".to_string(), "webm".to_string(), "ogg".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.http.port == 0 {
            return Err("[http].port must be > 0".to_string());
        }
        if self.board.max_calls == 0 {
            return Err("[board].max_calls must be > 0".to_string());
        }

        if self.call_log.dir.trim().is_empty() {
            return Err("[call_log].dir must not be empty".to_string());
        }
        if self.call_log.file.trim().is_empty() {
            return Err("[call_log].file must not be empty".to_string());
        }

        if self.media.refresh_secs == 0 {
            return Err("[media].refresh_secs must be > 0".to_string());
        }
        if self.media.extensions.iter().any(|e| e.trim().is_empty()) {
            return Err("[media].extensions must not contain empty entries".to_string());
        }

        if self.cloud.enabled {
            if self.cloud.database_url.trim().is_empty() {
                return Err("[cloud].database_url must not be empty when enabled".to_string());
            }
            if self.cloud.location_id.trim().is_empty() {
                return Err("[cloud].location_id must not be empty".to_string());
            }
            if self.cloud.timeout_secs == 0 {
                return Err("[cloud].timeout_secs must be > 0".to_string());
            }
            if self.cloud.fcm_project_id.is_some() != self.cloud.fcm_access_token.is_some() {
                return Err(
                    "[cloud] fcm_project_id and fcm_access_token must be set together".to_string(),
                );
            }
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load_from_default_paths()
    }

    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "qms-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            cloud: CloudConfig {
                enabled: false,
                database_url: "https://qms-default-rtdb.firebasedatabase.app".to_string(),
                ..CloudConfig::default()
            },
            ..ServerConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "qms-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.http.cors_origins, "*");
        assert_eq!(config.board.max_calls, 4);
        assert_eq!(config.call_log.dir, "logs");
        assert_eq!(config.call_log.file, "call_logs.csv");
        assert_eq!(config.media.dir, "static/media");
        assert_eq!(config.media.refresh_secs, 300);
        assert_eq!(config.media.extensions, vec!["mp4", "webm", "ogg"]);
        assert!(!config.cloud.enabled);
        assert_eq!(config.cloud.location_id, "LOC_1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[board]
max_calls = 6

[call_log]
dir = "/var/log/qms"

[cloud]
enabled = true
database_url = "https://example.firebasedatabase.app"
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.board.max_calls, 6);
        assert_eq!(config.call_log.dir, "/var/log/qms");
        assert_eq!(config.call_log.file, "call_logs.csv");
        assert!(config.cloud.enabled);
        assert_eq!(config.cloud.notification_tag, "qms-notification");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ServerConfig::example_toml();
        let table: toml::Table = toml::from_str(&example).unwrap();
        let section = table.get("qms-server").unwrap();
        let config: ServerConfig = toml::from_str(&toml::to_string(section).unwrap()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = ServerConfig::default();
        config.board.max_calls = 0;
        assert!(config.validate().unwrap_err().contains("max_calls"));
    }

    #[test]
    fn test_validate_cloud_requires_url() {
        let mut config = ServerConfig::default();
        config.cloud.enabled = true;
        assert!(config.validate().unwrap_err().contains("database_url"));
    }

    #[test]
    fn test_validate_fcm_settings_paired() {
        let mut config = ServerConfig::default();
        config.cloud.enabled = true;
        config.cloud.database_url = "https://example.firebasedatabase.app".to_string();
        config.cloud.fcm_project_id = Some("qms".to_string());
        assert!(config.validate().is_err());
        config.cloud.fcm_access_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("chatty".to_string());
        assert!(config.validate().is_err());
    }
}
