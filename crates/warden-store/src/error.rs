//! Error types for the session store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while reading or writing session data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Continuation was requested but the host has no recorded runs.
    #[error("no prior run to continue for host {hostname}")]
    NoPriorRun {
        /// The host whose record directory has no runs.
        hostname: String,
    },

    /// A path expected to be a directory is not one.
    #[error("not a directory: {path:?}")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
