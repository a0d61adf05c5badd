//! Error types for the sync orchestrator.

use offcache_core::{CollectionTag, StoreError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote data service calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A failure reported by the remote data service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Error message.
    pub message: String,
    /// Whether the call may succeed if repeated later.
    pub retryable: bool,
}

impl RemoteError {
    /// Creates a transient error (network down, timeout, server busy).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a permanent error (the server rejected the request).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync is running.
    #[error("a sync is already in progress")]
    AlreadyInProgress,

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Fetching a collection failed.
    #[error("fetching {collection} failed: {source}")]
    RemoteFetch {
        /// Collection being fetched.
        collection: CollectionTag,
        /// Remote failure.
        source: RemoteError,
    },

    /// Pushing a record failed.
    #[error("pushing {id:?} to {collection} failed: {source}")]
    RemotePush {
        /// Collection of the record.
        collection: CollectionTag,
        /// Record id.
        id: String,
        /// Remote failure.
        source: RemoteError,
    },

    /// The change synopsis could not be fetched.
    #[error("change synopsis failed: {0}")]
    RemoteSynopsis(RemoteError),

    /// A fetched document failed validation.
    #[error("document {id:?} rejected for {collection}: {reason}")]
    InvalidDocument {
        /// Collection of the document.
        collection: CollectionTag,
        /// Document id.
        id: String,
        /// Validation failure.
        reason: String,
    },

    /// The record is not waiting for a conflict resolution.
    #[error("record {id:?} in {collection} is not in conflict")]
    NotInConflict {
        /// Collection of the record.
        collection: CollectionTag,
        /// Record id.
        id: String,
    },
}

impl SyncError {
    /// Returns true if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::AlreadyInProgress => true,
            SyncError::RemoteFetch { source, .. } | SyncError::RemotePush { source, .. } => {
                source.is_retryable()
            }
            SyncError::RemoteSynopsis(source) => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the error is a local storage failure rather than a
    /// problem with one collection.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_storage_io())
    }
}
