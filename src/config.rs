//! # Server Configuration
//!
//! [`ServerConfig`] holds every tunable of the request pipeline. It can be built three ways:
//!
//! - [`ServerConfig::default()`] for the built-in values
//! - [`ServerConfig::from_env()`] to overlay `WEBOBJ_*` environment variables on the defaults
//! - [`ServerConfig::from_yaml_file()`] to load a YAML document; missing keys keep their defaults
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `WEBOBJ_ADDR` | `127.0.0.1:8080` |
//! | `WEBOBJ_MAX_REQUEST_LINE` | `2048` |
//! | `WEBOBJ_MAX_HEADER_LINE` | `65536` |
//! | `WEBOBJ_MAX_HEADERS` | `100` |
//! | `WEBOBJ_MAX_BODY_BYTES` | `1048576` |
//! | `WEBOBJ_READ_TIMEOUT_MS` | `60000` |
//! | `WEBOBJ_WRITE_TIMEOUT_MS` | `30000` |
//! | `WEBOBJ_EVENT_KEEPALIVE_MS` | `15000` |
//! | `WEBOBJ_STACK_SIZE` | `0x10000` |
//!
//! A value of `0` disables the corresponding timeout or keepalive. `WEBOBJ_STACK_SIZE` accepts
//! decimal or `0x`-prefixed hex. Values that fail to parse fall back to the default.
//!
//! ## Stack Size
//!
//! Every connection runs on its own coroutine, so total stack reservation is
//! `stack_size × open connections`. Event-stream subscribers hold their coroutine for as long as
//! the client stays connected.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Pipeline and runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub addr: String,
    /// Longest accepted request line in bytes, line ending included.
    pub max_request_line: usize,
    /// Longest accepted header line in bytes.
    pub max_header_line: usize,
    pub max_headers: usize,
    pub max_body_bytes: usize,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Idle interval after which an event stream gets a keepalive comment.
    pub event_keepalive_ms: u64,
    /// Coroutine stack size in bytes.
    #[serde(deserialize_with = "deserialize_size")]
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            max_request_line: 2048,
            max_header_line: 65536,
            max_headers: 100,
            max_body_bytes: 1024 * 1024,
            read_timeout_ms: 60_000,
            write_timeout_ms: 30_000,
            event_keepalive_ms: 15_000,
            stack_size: 0x10000,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `WEBOBJ_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            addr: env::var("WEBOBJ_ADDR").unwrap_or(d.addr),
            max_request_line: env_or("WEBOBJ_MAX_REQUEST_LINE", d.max_request_line),
            max_header_line: env_or("WEBOBJ_MAX_HEADER_LINE", d.max_header_line),
            max_headers: env_or("WEBOBJ_MAX_HEADERS", d.max_headers),
            max_body_bytes: env_or("WEBOBJ_MAX_BODY_BYTES", d.max_body_bytes),
            read_timeout_ms: env_or("WEBOBJ_READ_TIMEOUT_MS", d.read_timeout_ms),
            write_timeout_ms: env_or("WEBOBJ_WRITE_TIMEOUT_MS", d.write_timeout_ms),
            event_keepalive_ms: env_or("WEBOBJ_EVENT_KEEPALIVE_MS", d.event_keepalive_ms),
            stack_size: env::var("WEBOBJ_STACK_SIZE")
                .ok()
                .and_then(|v| parse_size(&v))
                .unwrap_or(d.stack_size),
        }
    }

    /// Load a YAML document; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid configuration document.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse a YAML document; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails on invalid YAML, unknown keys or mistyped values.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    #[must_use]
    pub fn event_keepalive(&self) -> Option<Duration> {
        millis(self.event_keepalive_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Decimal or `0x`-prefixed hex.
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }
    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size {s:?}"))),
    }
}
