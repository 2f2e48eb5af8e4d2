// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded, most-recent-first call history.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::call::CallRecord;

pub const DEFAULT_MAX_CALLS: usize = 4;

/// Point-in-time view of the history: the call being served plus the ones
/// before it, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    #[serde(serialize_with = "serialize_current")]
    pub current: Option<CallRecord>,
    pub history: Vec<CallRecord>,
}

impl CallSnapshot {
    /// Number of records the snapshot holds, current included.
    pub fn len(&self) -> usize {
        self.history.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

// An idle board serializes `current` as `{}` rather than `null`.
fn serialize_current<S: Serializer>(current: &Option<CallRecord>, s: S) -> Result<S::Ok, S::Error> {
    match current {
        Some(record) => record.serialize(s),
        None => s.serialize_map(Some(0))?.end(),
    }
}

/// Thread-safe ring of the last `capacity` calls.
#[derive(Debug)]
pub struct CallHistory {
    capacity: usize,
    calls: Mutex<VecDeque<CallRecord>>,
}

impl CallHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            calls: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new call at the front, evicting the oldest beyond capacity.
    pub fn add(&self, number: &str, counter: &str) -> CallRecord {
        let record = CallRecord::new(number, counter);
        self.push(record.clone());
        info!("New call added: {} at {}", number, counter);
        record
    }

    /// Insert an already-built record at the front.
    pub fn push(&self, record: CallRecord) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.push_front(record);
        calls.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let mut iter = calls.iter().cloned();
        let current = iter.next();
        CallSnapshot {
            current,
            history: iter.collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CallHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLS)
    }
}
