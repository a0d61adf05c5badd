//! The remote data service contract.

use crate::error::RemoteResult;
use offcache_core::{CollectionTag, Document, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;

/// One document as the server holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// Record id.
    pub id: String,
    /// Server-side version.
    pub version: u64,
    /// Server-side modification time.
    pub last_modified: Timestamp,
    /// The domain object.
    pub payload: Document,
}

/// What the server reports about a collection without sending it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSynopsis {
    /// Last time anything in the collection changed.
    pub last_updated: Timestamp,
    /// Number of documents in the collection.
    pub record_count: u64,
}

/// A network client for the remote data service.
///
/// This trait abstracts the wire protocol; any REST, GraphQL or RPC client
/// that can answer these four calls is enough. Per-call timeouts and retries
/// are the implementation's business; the orchestrator only sees success or
/// a [`crate::RemoteError`].
pub trait RemoteDataService: Send + Sync {
    /// Fetches every document of a collection, restricted to `user_id` for
    /// user-scoped collections.
    fn fetch_collection(
        &self,
        tag: CollectionTag,
        user_id: Option<&str>,
    ) -> RemoteResult<Vec<RemoteDocument>>;

    /// Returns a synopsis for each of `tags` the server knows.
    fn fetch_change_synopsis(
        &self,
        tags: &[CollectionTag],
    ) -> RemoteResult<HashMap<CollectionTag, CollectionSynopsis>>;

    /// Creates or replaces a document.
    fn upsert(&self, tag: CollectionTag, id: &str, payload: &Document) -> RemoteResult<()>;

    /// Deletes a document. Deleting an unknown id succeeds.
    fn delete(&self, tag: CollectionTag, id: &str) -> RemoteResult<()>;
}

impl<R: RemoteDataService + ?Sized> RemoteDataService for Arc<R> {
    fn fetch_collection(
        &self,
        tag: CollectionTag,
        user_id: Option<&str>,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        (**self).fetch_collection(tag, user_id)
    }

    fn fetch_change_synopsis(
        &self,
        tags: &[CollectionTag],
    ) -> RemoteResult<HashMap<CollectionTag, CollectionSynopsis>> {
        (**self).fetch_change_synopsis(tags)
    }

    fn upsert(&self, tag: CollectionTag, id: &str, payload: &Document) -> RemoteResult<()> {
        (**self).upsert(tag, id, payload)
    }

    fn delete(&self, tag: CollectionTag, id: &str) -> RemoteResult<()> {
        (**self).delete(tag, id)
    }
}
