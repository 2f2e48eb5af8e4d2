// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Call dispatch: commit a call, log it, fan it out.
//!
//! Only validation failures reach the caller. Once a call is in the history
//! every further step (log append, realtime broadcast, cloud mirror, push
//! notification) is best-effort and isolated from the others.

use std::sync::{Arc, Mutex};

use chrono::Local;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use qms_call_log::CallLog;
use qms_cloud::CloudSinks;
use qms_core::{validate_call, CallError, CallHistory, CallRecord, CallRequest, CallSnapshot};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

pub struct CallDispatcher {
    history: Arc<CallHistory>,
    log: Arc<CallLog>,
    sinks: CloudSinks,
    updates: broadcast::Sender<Arc<CallSnapshot>>,
    // Held across snapshot + send so broadcasts leave in history order.
    broadcast_lock: Mutex<()>,
}

impl CallDispatcher {
    pub fn new(history: Arc<CallHistory>, log: Arc<CallLog>, sinks: CloudSinks) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            history,
            log,
            sinks,
            updates,
            broadcast_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> CallSnapshot {
        self.history.snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn call_log(&self) -> Arc<CallLog> {
        self.log.clone()
    }

    /// Subscribe to snapshot broadcasts.
    ///
    /// The receiver is created before the snapshot is taken, so a call that
    /// lands in between shows up as a later update rather than being missed.
    pub fn subscribe(&self) -> (broadcast::Receiver<Arc<CallSnapshot>>, CallSnapshot) {
        let rx = self.updates.subscribe();
        (rx, self.history.snapshot())
    }

    /// Validate and process a decoded client payload.
    pub async fn process_request(&self, request: &CallRequest) -> Result<CallRecord, CallError> {
        let (number, counter) = request.validate()?;
        Ok(self.dispatch(number, counter).await)
    }

    /// Validate and process a call of `number` to `counter`.
    pub async fn process_call(&self, number: &str, counter: &str) -> Result<CallRecord, CallError> {
        let (number, counter) = validate_call(number, counter)?;
        Ok(self.dispatch(number, counter).await)
    }

    async fn dispatch(&self, number: String, counter: String) -> CallRecord {
        let record = self.history.add(&number, &counter);

        if !self.append_to_log(&record).await {
            warn!("Failed to log call to CSV: {} at {}", number, counter);
        }

        self.broadcast();

        tokio::join!(self.mirror(&record), self.push(&record));

        info!("Broadcasted call update: {} at {}", number, counter);
        record
    }

    fn broadcast(&self) {
        let _guard = self.broadcast_lock.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = Arc::new(self.history.snapshot());
        match self.updates.send(snapshot) {
            Ok(n) => debug!("current state sent to {} subscribers", n),
            Err(_) => debug!("no realtime subscribers connected"),
        }
    }

    async fn append_to_log(&self, record: &CallRecord) -> bool {
        let log = self.log.clone();
        let record = record.clone();
        match tokio::task::spawn_blocking(move || log.append(&record)).await {
            Ok(ok) => ok,
            Err(e) => {
                error!("call log task failed: {}", e);
                false
            }
        }
    }

    async fn mirror(&self, record: &CallRecord) {
        let Some(mirror) = &self.sinks.mirror else {
            debug!("cloud mirror disabled, skipping sync for {}", record.number);
            return;
        };
        if let Err(e) = mirror.set_current(record).await {
            error!("Failed to sync current call to cloud: {}", e);
        }
        if let Err(e) = mirror.set_history(record).await {
            error!("Failed to sync call history to cloud: {}", e);
            return;
        }
        info!("Successfully mirrored call {} to cloud", record.number);
    }

    async fn push(&self, record: &CallRecord) {
        let (Some(mirror), Some(push)) = (&self.sinks.mirror, &self.sinks.push) else {
            debug!("push notifications disabled, skipping {}", record.number);
            return;
        };
        let token = match mirror.lookup_push_token(&record.number).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("No push token found for number {}, skipping push", record.number);
                return;
            }
            Err(e) => {
                error!("Failed to look up push token for {}: {}", record.number, e);
                return;
            }
        };
        match push.notify(&token, record).await {
            Ok(id) => info!("Sent push notification to {}: {}", record.number, id),
            Err(e) => error!("Failed to send push notification to {}: {}", record.number, e),
        }
    }

    /// Remove previous days from the cloud history, if a mirror is configured.
    pub async fn cleanup_cloud_history(&self) {
        let Some(mirror) = &self.sinks.mirror else {
            return;
        };
        let today = Local::now().format("%Y-%m-%d").to_string();
        match mirror.cleanup_before(&today).await {
            Ok(0) => debug!("no stale cloud history to remove"),
            Ok(n) => info!("Removed {} old days of cloud history", n),
            Err(e) => error!("Error during cloud history cleanup: {}", e),
        }
    }
}
