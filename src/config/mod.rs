//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or malformed.
//! The store connection string is wrapped in secrecy::SecretString since it
//! usually embeds credentials.

pub mod secrets;

use crate::error::{Error, Result};
use secrets::SecretString;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DATABASE: &str = "LibreChat";
const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub struct Config {
    pub mongo_uri: SecretString,
    pub mongo_database: String,
    pub metrics_addr: SocketAddr,
    pub update_interval: Duration,
    pub query_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let addr = optional_var("METRICS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let metrics_addr = addr
            .parse()
            .map_err(|e| Error::Config(format!("METRICS_ADDR {addr:?} is not a socket address: {e}")))?;

        Ok(Self {
            mongo_uri: SecretString::from(required_var("MONGO_URI")?),
            mongo_database: optional_var("MONGO_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            metrics_addr,
            update_interval: seconds_var("UPDATE_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?,
            query_timeout: seconds_var("QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

/// Unset and empty are treated alike.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn seconds_var(name: &str, default: u64) -> Result<Duration> {
    let secs = match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("{name} must be a whole number of seconds: {e}")))?,
        None => default,
    };
    if secs == 0 {
        return Err(Error::Config(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}
