//! Error types shared by the stores, the notifier and the monitor task.

use std::path::PathBuf;

/// Errors raised by the appointment and settings stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing has been saved yet.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while presenting a toast, tile or badge.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification rejected: {0}")]
    Rejected(String),

    #[error("failed to write notification: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config line {line}: {content}")]
    InvalidLine { line: usize, content: String },

    #[error("{key} must be a positive whole number, got {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
}
