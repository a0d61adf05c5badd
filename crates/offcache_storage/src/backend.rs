//! Key-value store trait definition.

use crate::error::StorageResult;

/// A durable, key-addressed byte store.
///
/// # Invariants
///
/// - `get` returns exactly the bytes of the last successful `set` for that key
/// - A single `set` is atomic: readers never observe a partially written blob
/// - `multi_set` is atomic per key only; a failure may leave a prefix applied
/// - `remove_all` ignores keys that do not exist
///
/// Methods take `&self`; implementations use interior locking so one store
/// can be shared behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Reads the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Reads several keys, preserving the order of `keys`.
    ///
    /// # Errors
    ///
    /// Returns the first read error encountered.
    fn multi_get(&self, keys: &[&str]) -> StorageResult<Vec<(String, Option<Vec<u8>>)>> {
        keys.iter()
            .map(|key| Ok(((*key).to_string(), self.get(key)?)))
            .collect()
    }

    /// Writes several key-value pairs.
    ///
    /// # Errors
    ///
    /// Returns the first write error encountered. Earlier pairs stay written.
    fn multi_set(&self, pairs: &[(&str, &[u8])]) -> StorageResult<()> {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Removes every listed key.
    ///
    /// # Errors
    ///
    /// Returns an error if a removal fails.
    fn remove_all(&self, keys: &[&str]) -> StorageResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn multi_get(&self, keys: &[&str]) -> StorageResult<Vec<(String, Option<Vec<u8>>)>> {
        (**self).multi_get(keys)
    }

    fn multi_set(&self, pairs: &[(&str, &[u8])]) -> StorageResult<()> {
        (**self).multi_set(pairs)
    }

    fn remove_all(&self, keys: &[&str]) -> StorageResult<()> {
        (**self).remove_all(keys)
    }
}
