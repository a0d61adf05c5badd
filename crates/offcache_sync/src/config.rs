//! Runtime configuration for the sync orchestrator.

use offcache_core::ConflictStrategy;
use std::time::Duration;

/// How old the last sync may be before a sync is considered needed.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum age of the last sync before `is_sync_needed` reports true.
    pub staleness_window: Duration,
    /// Strategy written into a freshly created sync config.
    pub default_strategy: ConflictStrategy,
    /// Whether acknowledged tombstones are removed from the store.
    pub purge_acknowledged_deletes: bool,
}

impl OrchestratorConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            default_strategy: ConflictStrategy::default(),
            purge_acknowledged_deletes: true,
        }
    }

    /// Sets the staleness window.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Sets the strategy used when the sync config is first created.
    pub fn with_default_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Keeps acknowledged tombstones instead of purging them.
    pub fn with_purge_acknowledged_deletes(mut self, purge: bool) -> Self {
        self.purge_acknowledged_deletes = purge;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}
