// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Best-effort external sinks fed after a call is committed.

use std::future::Future;
use std::pin::Pin;

use crate::call::CallRecord;
use crate::DynResult;

/// Alias to reduce type complexity in the sink traits.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = DynResult<T>> + Send + 'a>>;

/// Cloud replica of the board consumed by the patient portal.
pub trait CloudMirror: Send + Sync {
    /// Overwrite the "now serving" pointer.
    fn set_current<'a>(&'a self, record: &'a CallRecord) -> SinkFuture<'a, ()>;

    /// Write the per-date history entry keyed by number (last write wins).
    fn set_history<'a>(&'a self, record: &'a CallRecord) -> SinkFuture<'a, ()>;

    /// Device token registered for `number`, if any.
    fn lookup_push_token<'a>(&'a self, number: &'a str) -> SinkFuture<'a, Option<String>>;

    /// Drop history for dates strictly before `date` (`YYYY-MM-DD`).
    /// Returns the number of dates removed.
    fn cleanup_before<'a>(&'a self, date: &'a str) -> SinkFuture<'a, usize>;
}

/// Push delivery to a single device.
pub trait PushNotifier: Send + Sync {
    /// Send the "your turn" notification; returns the provider's message id.
    fn notify<'a>(&'a self, token: &'a str, record: &'a CallRecord) -> SinkFuture<'a, String>;
}
