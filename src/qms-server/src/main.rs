// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod dispatcher;
mod media;
mod server;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use qms_app::init_logging;
use qms_call_log::CallLog;
use qms_cloud::CloudSinks;
use qms_core::{CallHistory, DynResult};

use config::ServerConfig;
use dispatcher::CallDispatcher;
use media::MediaLibrary;
use server::AppContext;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - clinic queue call board server");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Listen address
    #[arg(short = 'l', long = "listen", env = "QMS_HOST")]
    listen: Option<IpAddr>,
    /// Listen port
    #[arg(short = 'p', long = "port", env = "QMS_PORT")]
    port: Option<u16>,
    /// Calls kept on the board (current + history)
    #[arg(long = "max-calls", env = "QMS_MAX_CALLS")]
    max_calls: Option<usize>,
    /// Directory holding the CSV call log
    #[arg(long = "logs-dir", env = "QMS_LOGS_DIR")]
    logs_dir: Option<String>,
    /// Directory scanned for display media
    #[arg(long = "media-dir", env = "QMS_MEDIA_DIR")]
    media_dir: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "QMS_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Overlay command line and environment values on the file configuration.
    fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(listen) = self.listen {
            cfg.http.listen = listen;
        }
        if let Some(port) = self.port {
            cfg.http.port = port;
        }
        if let Some(max_calls) = self.max_calls {
            cfg.board.max_calls = max_calls;
        }
        if let Some(ref dir) = self.logs_dir {
            cfg.call_log.dir = dir.clone();
        }
        if let Some(ref dir) = self.media_dir {
            cfg.media.dir = dir.clone();
        }
        if let Some(ref level) = self.log_level {
            cfg.general.log_level = Some(level.clone());
        }
    }
}

fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    cli.apply(&mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cfg))
}

async fn run(cfg: ServerConfig) -> DynResult<()> {
    let log = CallLog::from_config(&cfg.call_log)?;
    info!("CSV logging to {}", log.path().display());

    let sinks = CloudSinks::from_config(&cfg.cloud)?;
    if sinks.mirror.is_none() {
        info!("Cloud mirror disabled");
    }

    let dispatcher = CallDispatcher::new(
        Arc::new(CallHistory::new(cfg.board.max_calls)),
        Arc::new(log),
        sinks,
    );
    let media = MediaLibrary::new(&cfg.media);
    let context = AppContext::new(dispatcher, media, cfg.http.cors_origins.clone());

    if cfg.cloud.enabled && cfg.cloud.cleanup_on_start {
        let dispatcher = context.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.cleanup_cloud_history().await;
        });
    }

    info!("Board keeps the last {} calls", cfg.board.max_calls);
    let addr = SocketAddr::new(cfg.http.listen, cfg.http.port);
    if let Err(e) = server::serve(addr, context).await {
        warn!("http server stopped with error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
