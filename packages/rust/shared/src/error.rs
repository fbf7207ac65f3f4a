//! Error types for StoreFinder.
//!
//! Library crates use [`StoreFinderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all StoreFinder operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreFinderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a storefront.
    #[error("network error: {0}")]
    Network(String),

    /// The store list or section hierarchy could not be resolved.
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// A product record whose cache identity cannot be computed.
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    /// The worker pool has been shut down and no longer accepts tasks.
    #[error("worker pool is closed")]
    PoolClosed,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StoreFinderError>;

impl StoreFinderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-record error from any displayable message.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
