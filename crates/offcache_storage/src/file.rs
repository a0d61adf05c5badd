//! File-based key-value store for persistent caches.
//!
//! Directory layout:
//!
//! ```text
//! <root>/
//! ├─ LOCK                      # Advisory lock for single-process access
//! ├─ <encoded key>.blob        # One file per key
//! └─ <encoded key>.blob.tmp    # Transient, only during a write
//! ```

use crate::backend::KeyValueStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const BLOB_EXT: &str = ".blob";
const TEMP_EXT: &str = ".tmp";

/// A file-based key-value store.
///
/// Each key is stored in its own file. Writes go to a temporary file that is
/// synced and then renamed over the target, so a crash leaves either the old
/// or the new blob in place.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on its directory for its whole
/// lifetime; a second `FileStore` on the same directory fails with
/// [`StorageError::Locked`]. Within the process, per-key atomicity comes from
/// the rename.
///
/// # Example
///
/// ```no_run
/// use offcache_storage::{FileStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("cache-dir")).unwrap();
/// store.set("config", b"...").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or another
    /// process holds the lock.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;

        let lock_path = root.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: root.display().to_string(),
            });
        }

        Self::remove_stale_temp_files(root)?;

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Lists every stored key, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(encoded) = name.strip_suffix(BLOB_EXT) {
                if let Some(key) = decode_key(encoded) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn blob_path(&self, key: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(format!("{}{}", encode_key(key)?, BLOB_EXT)))
    }

    fn remove_stale_temp_files(root: &Path) -> StorageResult<()> {
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(TEMP_EXT));
            if is_temp {
                debug!(path = ?entry.path(), "removing interrupted write");
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let target = self.blob_path(key)?;
        let mut temp_name = target.clone().into_os_string();
        temp_name.push(TEMP_EXT);
        let temp = PathBuf::from(temp_name);

        {
            let mut file = File::create(&temp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> StorageResult<()> {
        for key in keys {
            match fs::remove_file(self.blob_path(key)?) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Maps a key to a file-name-safe string.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. The output never contains `.` so it cannot collide with the
/// extensions.
fn encode_key(key: &str) -> StorageResult<String> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }

    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    Ok(out)
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
