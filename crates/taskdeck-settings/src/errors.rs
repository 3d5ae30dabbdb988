//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Settings file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Merged JSON does not fit the settings shape.
    #[error("settings do not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// The listener cannot bind port 0 from configuration.
    #[error("server.port must be 1-65535")]
    InvalidPort,
    /// The connection pool needs at least one connection.
    #[error("database.poolSize must be at least 1, got {0}")]
    InvalidPoolSize(u32),
    /// No log filter configured.
    #[error("logging.level is empty")]
    EmptyLogLevel,
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
