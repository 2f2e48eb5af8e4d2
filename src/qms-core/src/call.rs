// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Call records and inbound call validation.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Upper bound, in characters, for both the number and the counter label.
pub const MAX_FIELD_LEN: usize = 50;

/// ISO-8601 local timestamp used in realtime payloads and cloud writes.
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Reasons an inbound call request is rejected before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("No data provided")]
    MissingPayload,
    #[error("Number is required")]
    NumberRequired,
    #[error("Counter is required")]
    CounterRequired,
    #[error("Number too long")]
    NumberTooLong,
    #[error("Counter name too long")]
    CounterTooLong,
}

/// One "number called to counter" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub number: String,
    pub counter: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Local>,
}

impl CallRecord {
    /// Record a call at the current local time.
    pub fn new(number: impl Into<String>, counter: impl Into<String>) -> Self {
        Self::at(number, counter, Local::now())
    }

    pub fn at(number: impl Into<String>, counter: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            number: number.into(),
            counter: counter.into(),
            timestamp,
        }
    }

    /// `YYYY-MM-DD` of the call in local time.
    pub fn date_string(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// `HH:MM:SS` of the call in local time.
    pub fn time_string(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    pub fn iso_timestamp(&self) -> String {
        self.timestamp.format(ISO_TIMESTAMP_FORMAT).to_string()
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(ISO_TIMESTAMP_FORMAT))
}

/// Inbound `{number, counter}` payload as sent by HTTP and WebSocket clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub counter: Option<String>,
}

impl CallRequest {
    pub fn new(number: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            number: Some(number.into()),
            counter: Some(counter.into()),
        }
    }

    /// Decode a raw JSON payload. Anything but a non-empty object, or fields
    /// that are not strings, counts as no data.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CallError> {
        match &value {
            serde_json::Value::Object(map) if !map.is_empty() => {}
            _ => return Err(CallError::MissingPayload),
        }
        serde_json::from_value(value).map_err(|_| CallError::MissingPayload)
    }

    /// Trim and check both fields, returning the cleaned `(number, counter)`.
    pub fn validate(&self) -> Result<(String, String), CallError> {
        validate_call(
            self.number.as_deref().unwrap_or_default(),
            self.counter.as_deref().unwrap_or_default(),
        )
    }
}

/// Trim and check a raw number/counter pair.
pub fn validate_call(number: &str, counter: &str) -> Result<(String, String), CallError> {
    let number = number.trim();
    let counter = counter.trim();

    if number.is_empty() {
        return Err(CallError::NumberRequired);
    }
    if counter.is_empty() {
        return Err(CallError::CounterRequired);
    }
    if number.chars().count() > MAX_FIELD_LEN {
        return Err(CallError::NumberTooLong);
    }
    if counter.chars().count() > MAX_FIELD_LEN {
        return Err(CallError::CounterTooLong);
    }

    Ok((number.to_string(), counter.to_string()))
}
