//! Storage key layout.
//!
//! ```text
//! offcache/collection/<tag>   # encoded Vec<EntityRecord>
//! offcache/meta/<tag>         # encoded CollectionMetadata
//! offcache/config             # encoded SyncConfig
//! ```

use crate::types::CollectionTag;

/// Prefix shared by every key the cache writes.
pub const KEY_PREFIX: &str = "offcache";

/// Key of the global sync config blob.
pub const CONFIG_KEY: &str = "offcache/config";

/// Key of a collection's record blob.
pub fn collection_key(tag: CollectionTag) -> String {
    format!("{KEY_PREFIX}/collection/{tag}")
}

/// Key of a collection's metadata blob.
pub fn metadata_key(tag: CollectionTag) -> String {
    format!("{KEY_PREFIX}/meta/{tag}")
}

/// Every key the cache may have written.
pub(crate) fn all_keys() -> Vec<String> {
    let mut keys: Vec<String> = CollectionTag::ALL
        .into_iter()
        .flat_map(|tag| [collection_key(tag), metadata_key(tag)])
        .collect();
    keys.push(CONFIG_KEY.to_string());
    keys
}
