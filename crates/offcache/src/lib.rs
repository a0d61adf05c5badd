//! # offcache
//!
//! An offline-first local cache that syncs with a remote data service.
//!
//! Application code talks to [`OfflineCache`]: reads always come from the
//! local store and never touch the network; mutations are written locally
//! as pending changes; [`OfflineCache::trigger_sync`] reconciles with the
//! server when it is worth doing.
//!
//! ```rust
//! use offcache::{CollectionTag, OfflineCache, InMemoryRemote, SystemClock};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let remote = InMemoryRemote::new(Arc::new(SystemClock));
//! let cache = OfflineCache::builder().build(remote).unwrap();
//!
//! let id = cache.create(CollectionTag::Stories, json!({"title": "Opening day"})).unwrap();
//! let story: Option<serde_json::Value> = cache.get_by_id(CollectionTag::Stories, &id);
//! assert!(story.is_some());
//!
//! let outcome = cache.trigger_sync().unwrap();
//! assert_eq!(outcome.items_pushed, 1);
//! ```
//!
//! ## Crates
//!
//! - `offcache_storage`: the key-value backends
//! - `offcache_core`: records, registry and the versioned entity store
//! - `offcache_sync`: the remote contract and the sync orchestrator

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod typed;

pub use cache::{OfflineCache, OfflineCacheBuilder, LOCAL_ID_PREFIX};
pub use error::{CacheError, CacheResult};
pub use typed::TypedCollection;

pub use offcache_core::{
    Clock, CollectionDescriptor, CollectionRegistry, CollectionScope, CollectionTag,
    ConflictResolution, ConflictStrategy, Document, Entity, EntityRecord, ManualClock,
    StorageStats, StoreError, SyncStatus, SystemClock, Timestamp,
};
pub use offcache_storage::{FileStore, InMemoryStore, KeyValueStore};
pub use offcache_sync::{
    ConflictRecord, InMemoryRemote, OrchestratorConfig, RemoteDataService, RemoteError,
    SyncError, SyncOutcome, SyncStats,
};
