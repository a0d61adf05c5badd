//! Persisted, process-wide sync configuration.

use crate::conflict::ConflictStrategy;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Version of the cached data layout.
///
/// A cache written under a different data version is wiped on open and
/// refilled by the next full sync.
pub const DATA_VERSION: u32 = 1;

/// Sync bookkeeping persisted next to the collections.
///
/// Created with zero timestamps on first run, rewritten before and after
/// every sync attempt, and removed only by a full cache clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Completion time of the last sync of any kind.
    pub last_sync_timestamp: Timestamp,
    /// Layout version of the cached data.
    pub data_version: u32,
    /// Set while a sync is running; still set after a crash mid-sync.
    pub sync_in_progress: bool,
    /// Completion time of the last initial (full) sync.
    pub last_full_sync: Timestamp,
    /// Strategy applied to conflicts found during sync.
    pub conflict_resolution_strategy: ConflictStrategy,
    /// User that the user-scoped collections were fetched for.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl SyncConfig {
    /// Creates the first-run configuration.
    #[must_use]
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            last_sync_timestamp: Timestamp::ZERO,
            data_version: DATA_VERSION,
            sync_in_progress: false,
            last_full_sync: Timestamp::ZERO,
            conflict_resolution_strategy: strategy,
            user_id: None,
        }
    }

    /// Returns true if no sync has ever completed.
    #[must_use]
    pub fn never_synced(&self) -> bool {
        self.last_sync_timestamp.is_zero()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(ConflictStrategy::default())
    }
}
