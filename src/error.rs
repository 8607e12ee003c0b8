//! Error types for every subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for top-level operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid worker count: {0}")]
    InvalidWorkers(usize),
    #[error("Interval `{0}` must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("Invalid coordinator URL `{url}`: {reason}")]
    InvalidCoordinator { url: String, reason: String },
}

/// Failure to produce a candidate key.
#[derive(Debug, Error)]
pub enum KeyGenError {
    #[error("Entropy source failed: {0}")]
    Entropy(String),
    #[error("Key generation failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid pattern `{pattern}`: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors talking to the coordinator.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Coordinator answered {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that stop the coordinator service.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unable to open match log {path}: {source}")]
    MatchLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Unable to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
