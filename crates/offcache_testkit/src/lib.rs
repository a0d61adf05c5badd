//! # offcache testkit
//!
//! Test utilities for offcache.
//!
//! This crate provides:
//! - Fixtures wiring a cache to an in-memory remote and a manual clock
//! - File-backed fixtures that survive a simulated restart
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use offcache_testkit::prelude::*;
//! use serde_json::json;
//!
//! let fixture = Fixture::new();
//! fixture.remote.put(CollectionTag::Teams, "t1", json!({"id": "t1"}));
//!
//! let cache = fixture.cache();
//! cache.initial_sync(None).unwrap();
//! assert_eq!(cache.records(CollectionTag::Teams).len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use offcache::{CollectionTag, OfflineCache};
}

pub use fixtures::*;
pub use generators::*;
