// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StaleError {
    /// Malformed trigger/dependency shape, empty or invalid glob pattern.
    ///
    /// Always raised before any filesystem access.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Enumeration or stat failure while resolving triggers or walking a tree.
    #[error("Filesystem error at {path:?}: {source}")]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A user-supplied destination/target callback failed.
    #[error("Trigger callback for pattern '{pattern}' failed: {source}")]
    CallbackError {
        pattern: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timestamp store error: {0}")]
    StoreError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StaleError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StaleError::FilesystemError {
            path: path.into(),
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StaleError>;
