//! Error types for the entity store.

use crate::types::CollectionTag;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in entity store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key-value backend failed.
    #[error("storage I/O error: {0}")]
    StorageIo(#[from] offcache_storage::StorageError),

    /// A persisted blob could not be decoded.
    #[error("decode error for {key}: {message}")]
    Decode {
        /// Storage key of the blob.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// A value could not be encoded.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },

    /// No live record with this id exists.
    #[error("record {id:?} not found in {collection}")]
    RecordNotFound {
        /// Collection searched.
        collection: CollectionTag,
        /// Missing id.
        id: String,
    },

    /// A payload was rejected before it reached storage.
    #[error("invalid payload for {collection}: {message}")]
    InvalidPayload {
        /// Target collection.
        collection: CollectionTag,
        /// Why it was rejected.
        message: String,
    },

    /// The collection is not part of the active registry.
    #[error("collection {0} is not registered")]
    UnregisteredCollection(CollectionTag),
}

impl StoreError {
    /// Creates a decode error.
    pub fn decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a record-not-found error.
    pub fn not_found(collection: CollectionTag, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            collection,
            id: id.into(),
        }
    }

    /// Returns true if this error came from the storage backend.
    pub fn is_storage_io(&self) -> bool {
        matches!(self, StoreError::StorageIo(_))
    }
}
