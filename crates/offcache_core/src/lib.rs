//! # offcache core
//!
//! The versioned entity store of the offline cache.
//!
//! This crate provides:
//! - The record model ([`EntityRecord`], [`CollectionMetadata`], [`SyncConfig`])
//! - The closed set of collections ([`CollectionTag`]) and their registry
//! - [`EntityStore`], which persists one blob per collection over a
//!   [`offcache_storage::KeyValueStore`] with merge-on-write semantics
//! - Conflict strategies and resolutions shared with the sync orchestrator
//!
//! ## Key Invariants
//!
//! - Record versions never decrease
//! - A store-level write never clobbers a record with un-pushed local changes
//! - Reads are fail-open on corrupted blobs; writes are fail-closed
//! - Deletes are soft until the remote service acknowledges them

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod conflict;
mod document;
mod error;
mod keys;
mod record;
mod registry;
mod stats;
mod store;
mod time;
mod types;

pub use codec::{decode_blob, encode_blob, BLOB_FORMAT};
pub use config::{SyncConfig, DATA_VERSION};
pub use conflict::{ConflictResolution, ConflictStrategy};
pub use document::{merge_patch, overlay, Document};
pub use error::{StoreError, StoreResult};
pub use keys::{collection_key, metadata_key, CONFIG_KEY, KEY_PREFIX};
pub use record::{CollectionMetadata, EntityRecord};
pub use registry::{CollectionDescriptor, CollectionRegistry, CollectionScope, Entity};
pub use stats::StorageStats;
pub use store::{Acknowledgement, EntityStore, MergeSummary};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::{CollectionTag, ParseCollectionTagError, SyncStatus};
