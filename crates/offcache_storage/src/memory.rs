//! In-memory key-value store for testing.

use crate::backend::KeyValueStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory key-value store.
///
/// This store keeps every blob in a sorted map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Caches that don't need to survive a restart
///
/// Writes can be switched off with [`InMemoryStore::fail_writes`] to
/// exercise storage failure paths.
///
/// # Example
///
/// ```rust
/// use offcache_storage::{InMemoryStore, KeyValueStore};
///
/// let store = InMemoryStore::new();
/// store.set("a", b"1").unwrap();
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    ///
    /// Useful for simulating a cache left behind by an earlier process.
    #[must_use]
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Returns every key currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Makes every subsequent write fail with [`StorageError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check_writable()?;
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn multi_get(&self, keys: &[&str]) -> StorageResult<Vec<(String, Option<Vec<u8>>)>> {
        let entries = self.entries.read();
        Ok(keys
            .iter()
            .map(|key| ((*key).to_string(), entries.get(*key).cloned()))
            .collect())
    }

    fn multi_set(&self, pairs: &[(&str, &[u8])]) -> StorageResult<()> {
        self.check_writable()?;
        let mut entries = self.entries.write();
        for (key, value) in pairs {
            entries.insert((*key).to_string(), value.to_vec());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> StorageResult<()> {
        self.check_writable()?;
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
