//! Test fixtures and cache helpers.
//!
//! A [`Fixture`] bundles the pieces a sync test needs: a manual clock, an
//! in-memory backend the test can inspect or corrupt, and an in-memory
//! remote the test can edit from the "server side".

use offcache::{CollectionRegistry, OfflineCache, OrchestratorConfig};
use offcache_core::{collection_key, CollectionTag, EntityStore, ManualClock, Timestamp};
use offcache_storage::{FileStore, InMemoryStore, KeyValueStore};
use offcache_sync::InMemoryRemote;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Start time of every fixture clock.
pub const FIXTURE_EPOCH: Timestamp = Timestamp::from_millis(1_700_000_000_000);

/// An in-memory cache setup with a controllable clock and remote.
pub struct Fixture {
    /// The clock shared by the cache and the remote.
    pub clock: Arc<ManualClock>,
    /// The local backend.
    pub kv: Arc<InMemoryStore>,
    /// The remote service.
    pub remote: InMemoryRemote,
}

impl Fixture {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));
        Self {
            remote: InMemoryRemote::new(clock.clone()),
            kv: Arc::new(InMemoryStore::new()),
            clock,
        }
    }

    /// Opens a cache over the fixture's backend with default settings.
    pub fn cache(&self) -> OfflineCache<InMemoryRemote> {
        self.cache_with(CollectionRegistry::standard(), OrchestratorConfig::default())
    }

    /// Opens a cache over the fixture's backend.
    pub fn cache_with(
        &self,
        registry: CollectionRegistry,
        config: OrchestratorConfig,
    ) -> OfflineCache<InMemoryRemote> {
        OfflineCache::builder()
            .kv(self.kv.clone())
            .clock(self.clock.clone())
            .registry(registry)
            .config(config)
            .build(self.remote.clone())
            .expect("Failed to build cache")
    }

    /// Opens a bare entity store over the fixture's backend.
    pub fn store(&self) -> EntityStore {
        EntityStore::open(self.kv.clone(), self.clock.clone()).expect("Failed to open store")
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Overwrites a collection blob with bytes that do not decode.
    pub fn corrupt(&self, tag: CollectionTag) {
        corrupt_collection(self.kv.as_ref(), tag);
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A file-backed cache setup that can be closed and reopened.
pub struct FileFixture {
    /// The clock shared by the cache and the remote.
    pub clock: Arc<ManualClock>,
    /// The remote service.
    pub remote: InMemoryRemote,
    dir: TempDir,
}

impl FileFixture {
    /// Creates a fixture rooted in a fresh temporary directory.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));
        Self {
            remote: InMemoryRemote::new(clock.clone()),
            clock,
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The cache directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Opens a cache over the directory. Only one may be open at a time.
    pub fn open(&self) -> OfflineCache<InMemoryRemote> {
        let kv = FileStore::open(self.dir.path()).expect("Failed to open file store");
        OfflineCache::builder()
            .kv(Arc::new(kv))
            .clock(self.clock.clone())
            .build(self.remote.clone())
            .expect("Failed to build cache")
    }

    /// Overwrites a collection blob with bytes that do not decode.
    pub fn corrupt(&self, tag: CollectionTag) {
        let kv = FileStore::open(self.dir.path()).expect("Failed to open file store");
        corrupt_collection(&kv, tag);
    }
}

impl Default for FileFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes garbage over the blob of `tag`.
pub fn corrupt_collection(kv: &dyn KeyValueStore, tag: CollectionTag) {
    kv.set(&collection_key(tag), b"\xff\x00not cbor")
        .expect("Failed to corrupt collection");
}

/// Runs a test with a fresh in-memory fixture.
///
/// # Example
///
/// ```rust
/// use offcache_testkit::with_fixture;
///
/// with_fixture(|fixture| {
///     let cache = fixture.cache();
///     assert!(cache.is_sync_needed());
/// });
/// ```
pub fn with_fixture<F, R>(f: F) -> R
where
    F: FnOnce(&Fixture) -> R,
{
    f(&Fixture::new())
}
