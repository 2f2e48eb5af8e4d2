// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Realtime database mirror over the Firebase REST API.
//!
//! Layout under the database root:
//! - `qms/locations/<loc>/current`: the call being served
//! - `qms/locations/<loc>/history/<YYYY-MM-DD>/<number>`: one entry per number per day
//! - `fcm_tokens/<loc>/<number>`: device token (string or `{token: ...}`)

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use qms_core::{CallRecord, CloudMirror, DynResult, SinkFuture};

use crate::{CloudConfig, CloudError};

#[derive(Debug, Serialize)]
struct CurrentEntry<'a> {
    number: &'a str,
    counter: &'a str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    time: String,
    counter: &'a str,
    status: &'static str,
    timestamp: String,
}

pub struct FirebaseMirror {
    client: reqwest::Client,
    base: reqwest::Url,
    location_id: String,
    auth_token: Option<String>,
}

impl FirebaseMirror {
    pub fn new(client: reqwest::Client, cfg: &CloudConfig) -> Result<Self, CloudError> {
        let database_url = cfg.database_url.trim().trim_end_matches('/');
        if database_url.is_empty() {
            return Err(CloudError::NotConfigured("[cloud].database_url"));
        }
        let base = reqwest::Url::parse(database_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| CloudError::InvalidUrl(database_url.to_string()))?;
        check_key(&cfg.location_id)?;
        Ok(Self {
            client,
            base,
            location_id: cfg.location_id.clone(),
            auth_token: cfg.auth_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    /// `<base>/<segments...>.json`, each segment percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, CloudError> {
        let Some((last, parents)) = segments.split_last() else {
            return Err(CloudError::InvalidKey(String::new()));
        };
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(parents)
            .push(&format!("{last}.json"));
        Ok(url)
    }

    fn location_url(&self, suffix: &[&str]) -> Result<reqwest::Url, CloudError> {
        let mut segments = vec!["qms", "locations", self.location_id.as_str()];
        segments.extend_from_slice(suffix);
        self.url(&segments)
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn put<T: Serialize + ?Sized>(&self, url: reqwest::Url, body: &T) -> Result<(), CloudError> {
        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(body)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn get(&self, url: reqwest::Url, shallow: bool) -> Result<Value, CloudError> {
        let mut req = self.request(reqwest::Method::GET, url);
        if shallow {
            req = req.query(&[("shallow", "true")]);
        }
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json::<Value>().await?)
    }

    async fn delete(&self, url: reqwest::Url) -> Result<(), CloudError> {
        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        check_status(resp).await.map(|_| ())
    }

    async fn write_current(&self, record: &CallRecord) -> Result<(), CloudError> {
        let entry = CurrentEntry {
            number: &record.number,
            counter: &record.counter,
            timestamp: record.iso_timestamp(),
        };
        self.put(self.location_url(&["current"])?, &entry).await
    }

    async fn write_history(&self, record: &CallRecord) -> Result<(), CloudError> {
        check_key(&record.number)?;
        let entry = HistoryEntry {
            time: record.time_string(),
            counter: &record.counter,
            status: "CALLED",
            timestamp: record.iso_timestamp(),
        };
        let date = record.date_string();
        let url = self.location_url(&["history", date.as_str(), record.number.as_str()])?;
        self.put(url, &entry).await
    }

    async fn read_push_token(&self, number: &str) -> Result<Option<String>, CloudError> {
        check_key(number)?;
        let url = self.url(&["fcm_tokens", self.location_id.as_str(), number])?;
        let value = self.get(url, false).await?;
        debug!("fetched token data for {}: {}", number, value);
        Ok(parse_push_token(number, &value))
    }

    async fn remove_stale_history(&self, today: &str) -> Result<usize, CloudError> {
        let keys = self.get(self.location_url(&["history"])?, true).await?;
        let mut deleted = 0;
        for date in stale_dates(&keys, today) {
            self.delete(self.location_url(&["history", date.as_str()])?).await?;
            deleted += 1;
        }
        if deleted > 0 {
            info!("Cleaned up {} old days of history from the cloud mirror", deleted);
        }
        Ok(deleted)
    }
}

impl CloudMirror for FirebaseMirror {
    fn set_current<'a>(&'a self, record: &'a CallRecord) -> SinkFuture<'a, ()> {
        Box::pin(async move { boxed(self.write_current(record).await) })
    }

    fn set_history<'a>(&'a self, record: &'a CallRecord) -> SinkFuture<'a, ()> {
        Box::pin(async move { boxed(self.write_history(record).await) })
    }

    fn lookup_push_token<'a>(&'a self, number: &'a str) -> SinkFuture<'a, Option<String>> {
        Box::pin(async move { boxed(self.read_push_token(number).await) })
    }

    fn cleanup_before<'a>(&'a self, date: &'a str) -> SinkFuture<'a, usize> {
        Box::pin(async move { boxed(self.remove_stale_history(date).await) })
    }
}

fn boxed<T>(result: Result<T, CloudError>) -> DynResult<T> {
    result.map_err(Into::into)
}

pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CloudError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CloudError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Database keys may not be empty or contain `.`, `$`, `#`, `[`, `]` or `/`.
fn check_key(key: &str) -> Result<(), CloudError> {
    if key.is_empty() || key.contains(['.', '$', '#', '[', ']', '/']) {
        return Err(CloudError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Tokens are stored either as a bare string or as `{ "token": "..." }`.
fn parse_push_token(number: &str, value: &Value) -> Option<String> {
    let token = match value {
        Value::Null => return None,
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("token") {
            Some(Value::String(s)) => s.as_str(),
            _ => {
                info!("Token record for {} has no 'token' field", number);
                return None;
            }
        },
        other => {
            warn!("Invalid token format for {}: {}", number, other);
            return None;
        }
    };
    let token = token.trim();
    if token.is_empty() {
        warn!("Empty push token stored for {}", number);
        return None;
    }
    Some(token.to_string())
}

/// Keys of a shallow history listing that sort before `today`.
fn stale_dates(keys: &Value, today: &str) -> Vec<String> {
    let Value::Object(map) = keys else {
        return Vec::new();
    };
    let mut dates: Vec<String> = map
        .keys()
        .filter(|date| date.as_str() < today)
        .cloned()
        .collect();
    dates.sort();
    dates
}
