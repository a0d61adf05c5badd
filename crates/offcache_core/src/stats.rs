//! Storage statistics.

use crate::time::Timestamp;
use serde::Serialize;

/// A snapshot of what the cache holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Live records across every collection.
    pub total_entities: u64,
    /// Records (tombstones included) waiting to be pushed.
    pub pending_sync_count: u64,
    /// Records waiting for a conflict resolution.
    pub conflict_count: u64,
    /// Records the server rejected.
    pub error_count: u64,
    /// Completion time of the last sync, if any.
    pub last_sync: Option<Timestamp>,
    /// Bytes held by the cache's blobs.
    pub cache_size_estimate: u64,
}
