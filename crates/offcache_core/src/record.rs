//! Entity records and per-collection metadata.

use crate::document::Document;
use crate::time::Timestamp;
use crate::types::{CollectionTag, SyncStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One cached domain object plus its sync bookkeeping.
///
/// # Lifecycle
///
/// - Created locally: `Pending`, version 1
/// - Created by a server pull: `Synced`, the server's version
/// - Every local write bumps `version` and moves the record to `Pending`
/// - A successful push moves it back to `Synced`
/// - A delete sets `is_deleted`; the tombstone is purged once the server
///   acknowledges it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Identifier, unique within the collection.
    pub id: String,
    /// Owning collection.
    pub entity_type: CollectionTag,
    /// The domain object.
    pub payload: Document,
    /// Monotonic version, bumped by every local write.
    pub version: u64,
    /// Last local or last known server modification.
    pub last_modified: Timestamp,
    /// Position relative to the remote service.
    pub sync_status: SyncStatus,
    /// Tombstone flag.
    pub is_deleted: bool,
    /// Server copy kept while the record waits for a manual conflict resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_payload: Option<Document>,
}

impl EntityRecord {
    /// Creates a record for a local mutation that has not been pushed yet.
    pub fn local(
        entity_type: CollectionTag,
        id: impl Into<String>,
        payload: Document,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            payload,
            version: 1,
            last_modified: now,
            sync_status: SyncStatus::Pending,
            is_deleted: false,
            conflict_payload: None,
        }
    }

    /// Creates a record from a document fetched from the server.
    pub fn from_server(
        entity_type: CollectionTag,
        id: impl Into<String>,
        payload: Document,
        version: u64,
        last_modified: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            payload,
            version,
            last_modified,
            sync_status: SyncStatus::Synced,
            is_deleted: false,
            conflict_payload: None,
        }
    }

    /// Returns true unless the record is a tombstone.
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Returns true if the record waits to be pushed.
    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }

    /// Returns true if the record carries changes the server has not seen.
    pub fn has_local_changes(&self) -> bool {
        self.sync_status.has_local_changes()
    }

    /// Deserializes the payload into a domain type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Records a local write: bumps the version and marks the record pending.
    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.version = self.version.saturating_add(1);
        self.last_modified = now;
        if self.sync_status != SyncStatus::Conflict {
            self.sync_status = SyncStatus::Pending;
        }
    }
}

/// A cheap synopsis of one collection, used to skip needless refetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    /// Last time the collection blob was written.
    pub last_updated: Timestamp,
    /// Number of live records.
    pub record_count: u64,
    /// Highest record version in the collection.
    pub version: u64,
    /// Remote `last_updated` seen by the last full fetch.
    #[serde(default)]
    pub remote_updated: Option<Timestamp>,
    /// Remote record count seen by the last full fetch.
    #[serde(default)]
    pub remote_record_count: Option<u64>,
}

impl CollectionMetadata {
    /// Recomputes the local fields from a full record list, keeping the
    /// remote observations of `previous`.
    pub fn summarize(
        records: &[EntityRecord],
        now: Timestamp,
        previous: Option<&CollectionMetadata>,
    ) -> Self {
        Self {
            last_updated: now,
            record_count: records.iter().filter(|r| r.is_live()).count() as u64,
            version: records.iter().map(|r| r.version).max().unwrap_or(0),
            remote_updated: previous.and_then(|p| p.remote_updated),
            remote_record_count: previous.and_then(|p| p.remote_record_count),
        }
    }
}
