//! Structured logging setup.
//!
//! JSON lines for production, pretty output for development. The filter comes from
//! `WEBOBJ_LOG_LEVEL` and accepts full `EnvFilter` directives (`info,webobj::router=debug`), not
//! just a bare level.

use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives, e.g. `info` or `warn,webobj=debug`.
    pub log_level: String,
    pub format: LogFormat,
    /// Include file:line location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read `WEBOBJ_LOG_LEVEL`, `WEBOBJ_LOG_FORMAT` and `WEBOBJ_LOG_INCLUDE_LOCATION`.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            log_level: env::var("WEBOBJ_LOG_LEVEL").unwrap_or(d.log_level),
            format: env::var("WEBOBJ_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(d.format),
            include_location: env::var("WEBOBJ_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(d.include_location),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails on an invalid filter or when a global subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use webobj::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env()).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log filter {:?}", config.log_level))?;

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")
}
