//! Error types for librechat-metrics.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("{operation} on {collection} timed out after {after:?}")]
    Timeout {
        collection: String,
        operation: &'static str,
        after: Duration,
    },

    #[error("malformed {collection} row: {message}")]
    Decode {
        collection: String,
        message: String,
    },

    #[error("metric already defined: {0}")]
    DuplicateMetric(String),

    #[error("metric not defined: {0}")]
    UnknownMetric(String),

    #[error("metric {name} expects {expected} label value(s), got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
