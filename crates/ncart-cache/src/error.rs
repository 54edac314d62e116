//! Cache error types.

use thiserror::Error;

/// Errors from cartridge cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata sidecar could not be written or read.
    #[error("cache metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The handle was closed.
    #[error("cache handle is closed")]
    Closed,
}
