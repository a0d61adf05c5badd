//! # offcache storage
//!
//! The persistence layer underneath the offline cache.
//!
//! Backends are **opaque key-value stores**: they map string keys to byte
//! blobs and know nothing about collections, records or sync state. The
//! entity store above them owns every encoding decision.
//!
//! ## Guarantees
//!
//! - Writes are atomic per key (a reader sees the old or the new blob)
//! - No transactions across keys
//! - Must be `Send + Sync` so the facade and the sync orchestrator can share
//!   a single backend
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For tests and ephemeral caches
//! - [`FileStore`] - One file per key inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use offcache_storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("greeting", b"hello").unwrap();
//! assert_eq!(store.get("greeting").unwrap(), Some(b"hello".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KeyValueStore;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
