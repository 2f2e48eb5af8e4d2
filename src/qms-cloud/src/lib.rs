// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Cloud replication for the call board.
//!
//! [`FirebaseMirror`] keeps the patient portal's realtime database in step
//! with the board and [`FcmNotifier`] pushes a "your turn" message to the
//! device registered for a called number.

pub mod fcm;
pub mod firebase;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use qms_core::{CallRecord, CloudMirror, PushNotifier};

pub use fcm::FcmNotifier;
pub use firebase::FirebaseMirror;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// `[cloud]` section: realtime database mirror and push notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Whether cloud sync is enabled
    pub enabled: bool,
    /// Realtime database root URL
    pub database_url: String,
    /// Location key under `qms/locations/` and `fcm_tokens/`
    pub location_id: String,
    /// Database auth token, sent as `?auth=`
    pub auth_token: Option<String>,
    /// Project id for the FCM HTTP v1 API
    pub fcm_project_id: Option<String>,
    /// OAuth2 bearer token for the FCM HTTP v1 API
    pub fcm_access_token: Option<String>,
    /// Notification title template (`{number}`, `{counter}`)
    pub notification_title: String,
    /// Notification body template (`{number}`, `{counter}`)
    pub notification_body: String,
    /// Link opened when the notification is clicked
    pub notification_link: Option<String>,
    /// Web push tag; the browser replaces notifications sharing a tag
    pub notification_tag: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Remove previous days' history from the mirror at startup
    pub cleanup_on_start: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: String::new(),
            location_id: "LOC_1".to_string(),
            auth_token: None,
            fcm_project_id: None,
            fcm_access_token: None,
            notification_title: "Giliran Anda!".to_string(),
            notification_body: "Nombor {number} sila ke Kaunter {counter}".to_string(),
            notification_link: None,
            notification_tag: "qms-notification".to_string(),
            timeout_secs: 10,
            cleanup_on_start: true,
        }
    }
}

impl CloudConfig {
    /// Whether both FCM settings are present.
    pub fn push_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.fcm_project_id) && present(&self.fcm_access_token)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid database key '{0}'")]
    InvalidKey(String),
    #[error("invalid database url '{0}'")]
    InvalidUrl(String),
    #[error("cloud sync is not configured: {0}")]
    NotConfigured(&'static str),
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Sinks built from config; either may be absent.
#[derive(Clone, Default)]
pub struct CloudSinks {
    pub mirror: Option<Arc<dyn CloudMirror>>,
    pub push: Option<Arc<dyn PushNotifier>>,
}

impl CloudSinks {
    /// Build the configured sinks, or empty sinks when cloud sync is disabled.
    pub fn from_config(cfg: &CloudConfig) -> Result<Self, CloudError> {
        if !cfg.enabled {
            return Ok(Self::default());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        let mirror: Arc<dyn CloudMirror> = Arc::new(FirebaseMirror::new(client.clone(), cfg)?);
        info!(
            "Cloud mirror enabled ({} / {})",
            cfg.database_url, cfg.location_id
        );

        let push: Option<Arc<dyn PushNotifier>> = if cfg.push_configured() {
            info!("Push notifications enabled");
            Some(Arc::new(FcmNotifier::new(client, cfg)?))
        } else {
            info!("Push notifications disabled (no FCM project/token configured)");
            None
        };

        Ok(Self {
            mirror: Some(mirror),
            push,
        })
    }
}

/// Substitute `{number}` and `{counter}` in a notification template.
pub fn render_template(template: &str, record: &CallRecord) -> String {
    template
        .replace("{number}", &record.number)
        .replace("{counter}", &record.counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let record = CallRecord::new("A12", "3");
        let cfg = CloudConfig::default();
        assert_eq!(
            render_template(&cfg.notification_body, &record),
            "Nombor A12 sila ke Kaunter 3"
        );
        assert_eq!(render_template("{number}{number}", &record), "A12A12");
    }

    #[test]
    fn test_push_configured() {
        let mut cfg = CloudConfig::default();
        assert!(!cfg.push_configured());
        cfg.fcm_project_id = Some("qms".to_string());
        cfg.fcm_access_token = Some("  ".to_string());
        assert!(!cfg.push_configured());
        cfg.fcm_access_token = Some("ya29.token".to_string());
        assert!(cfg.push_configured());
    }

    #[test]
    fn test_disabled_builds_no_sinks() {
        let sinks = CloudSinks::from_config(&CloudConfig::default()).unwrap();
        assert!(sinks.mirror.is_none());
        assert!(sinks.push.is_none());
    }

    #[test]
    fn test_enabled_without_push() {
        let cfg = CloudConfig {
            enabled: true,
            database_url: "https://example.firebaseio.test".to_string(),
            ..CloudConfig::default()
        };
        let sinks = CloudSinks::from_config(&cfg).unwrap();
        assert!(sinks.mirror.is_some());
        assert!(sinks.push.is_none());
    }
}
