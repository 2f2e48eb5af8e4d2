// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

#[path = "api.rs"]
mod api;
#[path = "realtime.rs"]
pub mod realtime;

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::middleware::DefaultHeaders;
use actix_web::{http::header, web, App, HttpServer};
use tokio::signal;
use tracing::info;

use crate::dispatcher::CallDispatcher;
use crate::media::MediaLibrary;

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppContext {
    pub dispatcher: web::Data<CallDispatcher>,
    pub media: web::Data<MediaLibrary>,
    pub subscribers: web::Data<Arc<AtomicUsize>>,
    pub cors_origins: String,
}

impl AppContext {
    pub fn new(dispatcher: CallDispatcher, media: MediaLibrary, cors_origins: String) -> Self {
        Self {
            dispatcher: web::Data::new(dispatcher),
            media: web::Data::new(media),
            subscribers: web::Data::new(Arc::new(AtomicUsize::new(0))),
            cors_origins,
        }
    }
}

pub async fn serve(addr: SocketAddr, context: AppContext) -> std::io::Result<()> {
    let server = build_server(addr, context)?;
    let handle = server.handle();
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down");
        handle.stop(true).await;
    });
    info!("http frontend listening on {}", addr);
    info!("  Call API:   http://{}/api/call_number", addr);
    info!("  WebSocket:  ws://{}/ws", addr);
    info!("  Events:     http://{}/events", addr);
    server.await
}

fn build_server(addr: SocketAddr, context: AppContext) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, context.cors_origins.clone())),
            )
            .configure(|cfg| configure(cfg, &context))
    })
    .shutdown_timeout(1)
    .disable_signals()
    .bind(addr)?
    .run();
    Ok(server)
}

/// Register shared state and all routes.
pub fn configure(cfg: &mut web::ServiceConfig, context: &AppContext) {
    cfg.app_data(context.dispatcher.clone())
        .app_data(context.media.clone())
        .app_data(context.subscribers.clone())
        .configure(api::configure);
}
