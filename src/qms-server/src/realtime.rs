// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Push channels for the display boards: a WebSocket at `/ws` and an SSE
//! stream at `/events`.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use actix_web::http::header;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use bytes::Bytes;
use futures_util::stream::{once, select, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use qms_core::{CallRequest, CallSnapshot};

use crate::dispatcher::CallDispatcher;

const SSE_PING_INTERVAL: Duration = Duration::from_secs(15);

/// Envelope for every message on the WebSocket, in both directions.
#[derive(Debug, Serialize, Deserialize)]
pub struct WsEvent<T> {
    pub event: String,
    #[serde(default)]
    pub data: T,
}

impl<T: Serialize> WsEvent<T> {
    fn to_json(event: &str, data: T) -> Option<String> {
        serde_json::to_string(&WsEvent {
            event: event.to_string(),
            data,
        })
        .ok()
    }
}

fn current_state_json(snapshot: &CallSnapshot) -> Option<String> {
    WsEvent::to_json("current_state", snapshot)
}

fn error_json(message: &str) -> Option<String> {
    WsEvent::to_json("error", serde_json::json!({ "message": message }))
}

/// Decrements the subscriber counter when a session goes away, however it ends.
struct SubscriberGuard(Arc<AtomicUsize>);

impl SubscriberGuard {
    fn register(counter: &Arc<AtomicUsize>) -> (Self, usize) {
        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        (Self(counter.clone()), count)
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Result of handling one inbound text frame.
#[derive(Debug, PartialEq)]
enum Inbound {
    /// Reply sent to this client only.
    Reply(String),
    Ignored,
}

async fn handle_text(dispatcher: &CallDispatcher, text: &str) -> Inbound {
    let message: WsEvent<serde_json::Value> = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("ignoring malformed websocket message: {}", e);
            return Inbound::Ignored;
        }
    };

    match message.event.as_str() {
        "call_number" => {
            let result = match CallRequest::from_json(message.data) {
                Ok(request) => dispatcher.process_request(&request).await,
                Err(e) => Err(e),
            };
            match result {
                // Success reaches every client through the broadcast.
                Ok(_) => Inbound::Ignored,
                Err(e) => {
                    warn!("Rejected websocket call: {}", e);
                    error_json(&e.to_string())
                        .map(Inbound::Reply)
                        .unwrap_or(Inbound::Ignored)
                }
            }
        }
        other => {
            debug!("ignoring websocket event '{}'", other);
            Inbound::Ignored
        }
    }
}

#[get("/ws")]
pub async fn ws(
    req: HttpRequest,
    body: web::Payload,
    dispatcher: web::Data<CallDispatcher>,
    subscribers: web::Data<Arc<AtomicUsize>>,
) -> Result<HttpResponse, Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    let (mut updates, initial) = dispatcher.subscribe();
    let (guard, count) = SubscriberGuard::register(subscribers.get_ref());
    let id = Uuid::new_v4();
    info!("Client connected: {} ({} subscribers)", id, count);

    actix_web::rt::spawn(async move {
        let _guard = guard;

        if let Some(json) = current_state_json(&initial) {
            if session.text(json).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                update = updates.recv() => {
                    let snapshot = match update {
                        Ok(snapshot) => snapshot,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Client {} lagged by {} updates, resyncing", id, n);
                            Arc::new(dispatcher.snapshot())
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    let Some(json) = current_state_json(&snapshot) else {
                        continue;
                    };
                    if session.text(json).await.is_err() {
                        break;
                    }
                }
                msg = msg_stream.recv() => {
                    let Some(Ok(msg)) = msg else {
                        break;
                    };
                    match msg {
                        Message::Text(text) => {
                            if let Inbound::Reply(reply) = handle_text(&dispatcher, &text).await {
                                if session.text(reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }

        let _ = session.close(None).await;
        info!("Client disconnected: {}", id);
    });

    Ok(response)
}

fn sse_frame(snapshot: &CallSnapshot) -> Option<Bytes> {
    serde_json::to_string(snapshot)
        .ok()
        .map(|json| Bytes::from(format!("data: {json}\n\n")))
}

#[get("/events")]
pub async fn events(
    dispatcher: web::Data<CallDispatcher>,
    subscribers: web::Data<Arc<AtomicUsize>>,
) -> Result<HttpResponse, Error> {
    let (rx, initial) = dispatcher.subscribe();
    let (guard, count) = SubscriberGuard::register(subscribers.get_ref());
    debug!("SSE subscriber connected ({} subscribers)", count);

    let initial = sse_frame(&initial).ok_or_else(|| {
        actix_web::error::ErrorInternalServerError("failed to encode call board state")
    })?;
    let initial_stream = once(async move { Ok::<Bytes, Error>(initial) });

    let updates = BroadcastStream::new(rx).filter_map(move |update| {
        let dispatcher = dispatcher.clone();
        async move {
            let snapshot = match update {
                Ok(snapshot) => snapshot,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!("SSE subscriber lagged by {} updates, resyncing", n);
                    Arc::new(dispatcher.snapshot())
                }
            };
            sse_frame(&snapshot).map(Ok::<Bytes, Error>)
        }
    });

    let pings = IntervalStream::new(time::interval(SSE_PING_INTERVAL))
        .map(|_| Ok::<Bytes, Error>(Bytes::from(": ping\n\n")));

    let stream = initial_stream.chain(select(pings, updates));
    let stream = DropStream::new(Box::pin(stream), move || drop(guard));

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream))
}

/// A stream wrapper that calls a callback when dropped.
struct DropStream<I> {
    inner: Pin<Box<dyn Stream<Item = I> + 'static>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl<I> DropStream<I> {
    fn new<S, F>(inner: Pin<Box<S>>, on_drop: F) -> Self
    where
        S: Stream<Item = I> + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner,
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl<I> Drop for DropStream<I> {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl<I> Stream for DropStream<I> {
    type Item = I;
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qms_cloud::CloudSinks;

    use crate::dispatcher::tests::dispatcher_with;

    #[test]
    fn test_subscriber_guard_counts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (a, count) = SubscriberGuard::register(&counter);
        assert_eq!(count, 1);
        let (b, count) = SubscriberGuard::register(&counter);
        assert_eq!(count, 2);
        drop(a);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(b);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_current_state_envelope() {
        let json = current_state_json(&CallSnapshot::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "current_state");
        assert_eq!(value["data"]["current"], serde_json::json!({}));
        assert_eq!(value["data"]["history"], serde_json::json!([]));
    }

    #[test]
    fn test_sse_frame_format() {
        let frame = sse_frame(&CallSnapshot::default()).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("\n\n"));
    }

    #[actix_web::test]
    async fn test_ws_call_number_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&dir, 4, CloudSinks::default());
        let (mut rx, _) = dispatcher.subscribe();

        let reply = handle_text(
            &dispatcher,
            r#"{"event":"call_number","data":{"number":"A7","counter":"Counter 2"}}"#,
        )
        .await;
        assert_eq!(reply, Inbound::Ignored);
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.current.as_ref().unwrap().number, "A7");
    }

    #[actix_web::test]
    async fn test_ws_validation_error_replies_to_sender() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&dir, 4, CloudSinks::default());

        let reply = handle_text(
            &dispatcher,
            r#"{"event":"call_number","data":{"number":"A7","counter":""}}"#,
        )
        .await;
        let Inbound::Reply(json) = reply else {
            panic!("expected an error reply");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["message"], "Counter is required");

        let reply = handle_text(&dispatcher, r#"{"event":"call_number","data":null}"#).await;
        assert!(matches!(reply, Inbound::Reply(json) if json.contains("No data provided")));

        let reply = handle_text(&dispatcher, r#"{"event":"call_number"}"#).await;
        assert!(matches!(reply, Inbound::Reply(json) if json.contains("No data provided")));
        assert_eq!(dispatcher.history_len(), 0);
    }

    #[actix_web::test]
    async fn test_ws_unknown_and_malformed_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher_with(&dir, 4, CloudSinks::default());

        assert_eq!(
            handle_text(&dispatcher, r#"{"event":"hello","data":{}}"#).await,
            Inbound::Ignored
        );
        assert_eq!(handle_text(&dispatcher, "not json").await, Inbound::Ignored);
        assert_eq!(dispatcher.history_len(), 0);
    }
}
