use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the host side of a session (key delivery, state sampling).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("input target is no longer accepting keys")]
    Disconnected,
    #[error("session state sample failed: {0}")]
    Probe(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures loading configuration or the persisted control sequence.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("control sequence in {path} rejected: {reason}")]
    InvalidControl { path: PathBuf, reason: String },
}
