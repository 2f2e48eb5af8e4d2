// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Push notifications through the FCM HTTP v1 API.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use qms_core::{CallRecord, PushNotifier, SinkFuture};

use crate::firebase::check_status;
use crate::{render_template, CloudConfig, CloudError};

pub const FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    name: String,
}

pub struct FcmNotifier {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    access_token: String,
    title: String,
    body: String,
    link: Option<String>,
    tag: String,
}

impl FcmNotifier {
    pub fn new(client: reqwest::Client, cfg: &CloudConfig) -> Result<Self, CloudError> {
        let project_id = cfg
            .fcm_project_id
            .clone()
            .ok_or(CloudError::NotConfigured("[cloud].fcm_project_id"))?;
        let access_token = cfg
            .fcm_access_token
            .clone()
            .ok_or(CloudError::NotConfigured("[cloud].fcm_access_token"))?;
        Ok(Self {
            client,
            endpoint: FCM_ENDPOINT.to_string(),
            project_id,
            access_token,
            title: cfg.notification_title.clone(),
            body: cfg.notification_body.clone(),
            link: cfg.notification_link.clone(),
            tag: cfg.notification_tag.clone(),
        })
    }

    /// Point the notifier at a different API host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the v1 `messages:send` body for `record`.
    fn message(&self, token: &str, record: &CallRecord) -> Value {
        let mut webpush = json!({
            "notification": {
                "tag": self.tag,
                "renotify": true,
            }
        });
        if let Some(link) = &self.link {
            webpush["fcm_options"] = json!({ "link": link });
        }
        json!({
            "message": {
                "token": token,
                "notification": {
                    "title": render_template(&self.title, record),
                    "body": render_template(&self.body, record),
                },
                "webpush": webpush,
            }
        })
    }

    async fn send(&self, token: &str, record: &CallRecord) -> Result<String, CloudError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&self.message(token, record))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let sent: SendResponse = resp.json().await?;
        info!("Sent push notification for {}: {}", record.number, sent.name);
        Ok(sent.name)
    }
}

impl PushNotifier for FcmNotifier {
    fn notify<'a>(&'a self, token: &'a str, record: &'a CallRecord) -> SinkFuture<'a, String> {
        Box::pin(async move { self.send(token, record).await.map_err(Into::into) })
    }
}
