//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be represented by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access to {path}")]
    Locked {
        /// The locked directory.
        path: String,
    },

    /// The backend refused the operation (used by fault-injecting stores).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
