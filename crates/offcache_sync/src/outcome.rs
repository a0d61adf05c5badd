//! What a sync run reports back.

use offcache_core::{CollectionTag, ConflictResolution, Document};
use std::time::Duration;

/// A record that changed on both sides since the last sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    /// Record id.
    pub id: String,
    /// Collection of the record.
    pub collection: CollectionTag,
    /// Local payload when the conflict was found.
    pub local_payload: Document,
    /// Whether the local side was a pending delete.
    pub local_deleted: bool,
    /// Server payload when the conflict was found.
    pub server_payload: Document,
    /// What the orchestrator did about it; `Skip` means the record waits
    /// in `Conflict` for the application.
    pub resolution: ConflictResolution,
}

/// Result of one sync run. Produced once per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Whether the run counts as successful.
    pub success: bool,
    /// Records fetched that did not exist locally.
    pub items_added: u64,
    /// Local records replaced by a newer server copy.
    pub items_updated: u64,
    /// Local records removed because the server no longer has them.
    pub items_deleted: u64,
    /// Local changes the server accepted.
    pub items_pushed: u64,
    /// Conflicts found during the pull.
    pub conflicts: Vec<ConflictRecord>,
    /// Human-readable failures that did not abort the run.
    pub errors: Vec<String>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncOutcome {
    /// The outcome of a sync that had nothing to do.
    pub fn noop() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Returns true if the run changed anything locally or remotely.
    pub fn has_changes(&self) -> bool {
        self.items_added + self.items_updated + self.items_deleted + self.items_pushed > 0
            || !self.conflicts.is_empty()
    }

    /// Conflicts still waiting for the application.
    pub fn unresolved_conflicts(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == ConflictResolution::Skip)
    }
}
