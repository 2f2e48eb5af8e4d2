// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod call;
pub mod history;
pub mod sink;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use call::{validate_call, CallError, CallRecord, CallRequest, MAX_FIELD_LEN};
pub use history::{CallHistory, CallSnapshot, DEFAULT_MAX_CALLS};
pub use sink::{CloudMirror, PushNotifier, SinkFuture};
