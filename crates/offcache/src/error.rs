//! Error type for the cache facade.

use offcache_core::StoreError;
use offcache_sync::SyncError;
use thiserror::Error;

/// Result type for facade operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by [`crate::OfflineCache`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// The entity store failed or rejected the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A sync could not run.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A typed value could not be converted to a document.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns true if the error is a storage failure.
    pub fn is_storage_io(&self) -> bool {
        match self {
            CacheError::Store(e) => e.is_storage_io(),
            CacheError::Sync(SyncError::Store(e)) => e.is_storage_io(),
            _ => false,
        }
    }

    /// Returns true if a sync was already running.
    pub fn is_sync_in_progress(&self) -> bool {
        matches!(self, CacheError::Sync(SyncError::AlreadyInProgress))
    }
}
