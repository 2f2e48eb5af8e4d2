// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level used when none is configured or the configured one is unknown.
pub const DEFAULT_LOG_LEVEL: Level = Level::INFO;

/// Resolve the configured level name.
pub fn parse_level(log_level: Option<&str>) -> Level {
    log_level
        .and_then(|s| s.trim().parse::<Level>().ok())
        .unwrap_or(DEFAULT_LOG_LEVEL)
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives, when set, refine the configured level per target.
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(log_level: Option<&str>) -> Level {
    let level = parse_level(log_level);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let installed = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("logging initialized at {}", level);
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("debug")), Level::DEBUG);
        assert_eq!(parse_level(Some(" WARN ")), Level::WARN);
        assert_eq!(parse_level(Some("chatty")), DEFAULT_LOG_LEVEL);
        assert_eq!(parse_level(None), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        assert_eq!(init_logging(Some("error")), Level::ERROR);
        assert_eq!(init_logging(Some("trace")), Level::TRACE);
    }
}
