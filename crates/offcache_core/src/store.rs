//! The versioned entity store.
//!
//! Each collection is persisted as one blob holding every record, tombstones
//! included, next to a metadata blob. Writes read the whole collection,
//! change it in memory and write both blobs back, so a concurrent reader
//! sees either the old or the new collection, never a torn record.
//!
//! Writers are serialized by an internal mutex; readers take no lock.

use crate::codec::{decode_blob, encode_blob};
use crate::config::{SyncConfig, DATA_VERSION};
use crate::conflict::ConflictResolution;
use crate::document::{merge_patch, overlay, Document};
use crate::error::{StoreError, StoreResult};
use crate::keys::{all_keys, collection_key, metadata_key, CONFIG_KEY};
use crate::record::{CollectionMetadata, EntityRecord};
use crate::stats::StorageStats;
use crate::time::{Clock, Timestamp};
use crate::types::{CollectionTag, SyncStatus};
use offcache_storage::KeyValueStore;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counts produced by [`EntityStore::store`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records that did not exist locally.
    pub added: u64,
    /// Records whose payload, tombstone or status changed.
    pub updated: u64,
    /// Records identical to the local copy.
    pub unchanged: u64,
    /// Records skipped because the local copy has un-pushed changes.
    pub protected: u64,
}

impl MergeSummary {
    /// Adds another summary into this one.
    pub fn absorb(&mut self, other: MergeSummary) {
        self.added += other.added;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.protected += other.protected;
    }
}

/// What happened when a push was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The record is now `Synced`.
    Synced,
    /// The acknowledged tombstone was removed.
    Purged,
    /// The record changed while the push was in flight and stays pending.
    Superseded,
    /// The record no longer exists.
    Missing,
}

/// Durable per-collection storage of [`EntityRecord`]s.
pub struct EntityStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl EntityStore {
    /// Opens a store over `kv`.
    ///
    /// A cache written under another [`DATA_VERSION`] has its collections
    /// wiped; a config blob that cannot be decoded is replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or rewritten.
    pub fn open(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let store = Self {
            kv,
            clock,
            write_lock: Mutex::new(()),
        };
        store.check_data_version()?;
        Ok(store)
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The store's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Reads (fail-open on corrupted blobs)
    // ------------------------------------------------------------------

    /// Returns every live record of a collection.
    ///
    /// A blob that fails to decode is treated as an empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn get_all(&self, tag: CollectionTag) -> StoreResult<Vec<EntityRecord>> {
        let mut records = self.read_lenient(tag)?;
        records.retain(EntityRecord::is_live);
        Ok(records)
    }

    /// Returns every record of a collection, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn all_records(&self, tag: CollectionTag) -> StoreResult<Vec<EntityRecord>> {
        self.read_lenient(tag)
    }

    /// Returns a live record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn get(&self, tag: CollectionTag, id: &str) -> StoreResult<Option<EntityRecord>> {
        Ok(self.get_raw(tag, id)?.filter(EntityRecord::is_live))
    }

    /// Returns a record by id even if it is a tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn get_raw(&self, tag: CollectionTag, id: &str) -> StoreResult<Option<EntityRecord>> {
        Ok(self.read_lenient(tag)?.into_iter().find(|r| r.id == id))
    }

    /// Records of a collection waiting to be pushed, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn pending(&self, tag: CollectionTag) -> StoreResult<Vec<EntityRecord>> {
        self.with_status(tag, SyncStatus::Pending)
    }

    /// Pending records of every collection that has any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn all_pending(&self) -> StoreResult<BTreeMap<CollectionTag, Vec<EntityRecord>>> {
        let mut pending = BTreeMap::new();
        for tag in CollectionTag::ALL {
            let records = self.pending(tag)?;
            if !records.is_empty() {
                pending.insert(tag, records);
            }
        }
        Ok(pending)
    }

    /// Records of a collection with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn with_status(
        &self,
        tag: CollectionTag,
        status: SyncStatus,
    ) -> StoreResult<Vec<EntityRecord>> {
        let mut records = self.read_lenient(tag)?;
        records.retain(|r| r.sync_status == status);
        Ok(records)
    }

    /// Metadata of a collection, `None` if never written or unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn metadata(&self, tag: CollectionTag) -> StoreResult<Option<CollectionMetadata>> {
        let key = metadata_key(tag);
        let Some(bytes) = self.kv.get(&key)? else {
            return Ok(None);
        };
        match decode_blob(&key, &bytes) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(collection = %tag, error = %e, "metadata unreadable; ignoring");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Writes (fail-closed on corrupted blobs)
    // ------------------------------------------------------------------

    /// Merges `incoming` into a collection by id.
    ///
    /// - Unknown ids are added.
    /// - A local record with un-pushed changes (`Pending` or `Conflict`) is
    ///   kept as-is; only its version is raised to the incoming one.
    /// - Any other local record is replaced by the incoming one, keeping the
    ///   higher of the two versions.
    ///
    /// The merged collection and its recomputed metadata are written back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the existing blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn store(
        &self,
        tag: CollectionTag,
        incoming: Vec<EntityRecord>,
    ) -> StoreResult<MergeSummary> {
        self.modify(tag, |records, _now| {
            let mut summary = MergeSummary::default();
            let mut index: HashMap<String, usize> = records
                .iter()
                .enumerate()
                .map(|(i, r)| (r.id.clone(), i))
                .collect();

            for mut record in incoming {
                record.entity_type = tag;
                match index.get(&record.id) {
                    None => {
                        index.insert(record.id.clone(), records.len());
                        records.push(record);
                        summary.added += 1;
                    }
                    Some(&i) => {
                        let existing = &mut records[i];
                        if existing.has_local_changes() {
                            existing.version = existing.version.max(record.version);
                            summary.protected += 1;
                            continue;
                        }

                        let changed = existing.payload != record.payload
                            || existing.is_deleted != record.is_deleted
                            || existing.sync_status != record.sync_status;
                        record.version = existing.version.max(record.version);
                        *existing = record;
                        if changed {
                            summary.updated += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                }
            }

            debug!(
                collection = %tag,
                added = summary.added,
                updated = summary.updated,
                protected = summary.protected,
                "stored batch"
            );
            Ok((summary, true))
        })
    }

    /// Writes a payload as a local mutation.
    ///
    /// A new id starts at version 1; an existing record (or tombstone) is
    /// revived with its version bumped. The result is `Pending`, unless the
    /// record was already in `Conflict`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn put_local(
        &self,
        tag: CollectionTag,
        id: &str,
        payload: Document,
    ) -> StoreResult<EntityRecord> {
        self.modify(tag, |records, now| {
            let record = match records.iter_mut().find(|r| r.id == id) {
                Some(existing) => {
                    existing.payload = payload;
                    existing.is_deleted = false;
                    existing.touch(now);
                    existing.clone()
                }
                None => {
                    let record = EntityRecord::local(tag, id, payload, now);
                    records.push(record.clone());
                    record
                }
            };
            Ok((record, true))
        })
    }

    /// Applies a merge patch to a live record as a local mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if no live record has this id.
    pub fn update_local(
        &self,
        tag: CollectionTag,
        id: &str,
        patch: &Document,
    ) -> StoreResult<EntityRecord> {
        self.update_local_checked(tag, id, patch, |_| Ok(()))
    }

    /// Like [`EntityStore::update_local`], but `validate` sees the patched
    /// payload under the collection lock and can veto the write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if no live record has this id,
    /// or [`StoreError::InvalidPayload`] if `validate` rejects the result.
    pub fn update_local_checked<V>(
        &self,
        tag: CollectionTag,
        id: &str,
        patch: &Document,
        validate: V,
    ) -> StoreResult<EntityRecord>
    where
        V: FnOnce(&Document) -> Result<(), String>,
    {
        self.modify(tag, |records, now| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id && r.is_live())
                .ok_or_else(|| StoreError::not_found(tag, id))?;

            let mut patched = record.payload.clone();
            merge_patch(&mut patched, patch);
            validate(&patched).map_err(|message| StoreError::InvalidPayload {
                collection: tag,
                message,
            })?;

            record.payload = patched;
            record.touch(now);
            Ok((record.clone(), true))
        })
    }

    /// Turns a record into a pending tombstone. Absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn soft_delete(&self, tag: CollectionTag, id: &str) -> StoreResult<()> {
        self.modify(tag, |records, now| {
            let Some(record) = records.iter_mut().find(|r| r.id == id) else {
                return Ok(((), false));
            };
            record.is_deleted = true;
            record.touch(now);
            record.sync_status = SyncStatus::Pending;
            record.conflict_payload = None;
            Ok(((), true))
        })
    }

    /// Records that the server accepted version `pushed_version` of a record.
    ///
    /// Tombstones are removed when `purge_deletes` is set. A record that
    /// changed since it was read for the push stays pending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn acknowledge(
        &self,
        tag: CollectionTag,
        id: &str,
        pushed_version: u64,
        purge_deletes: bool,
    ) -> StoreResult<Acknowledgement> {
        self.modify(tag, |records, _now| {
            let Some(index) = records.iter().position(|r| r.id == id) else {
                return Ok((Acknowledgement::Missing, false));
            };

            let record = &mut records[index];
            if record.version != pushed_version || !record.is_pending() {
                return Ok((Acknowledgement::Superseded, false));
            }

            if record.is_deleted && purge_deletes {
                records.remove(index);
                return Ok((Acknowledgement::Purged, true));
            }

            record.sync_status = SyncStatus::Synced;
            Ok((Acknowledgement::Synced, true))
        })
    }

    /// Marks a record as permanently rejected by the server.
    ///
    /// Ignored if the record changed since `pushed_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn mark_rejected(
        &self,
        tag: CollectionTag,
        id: &str,
        pushed_version: u64,
    ) -> StoreResult<bool> {
        self.modify(tag, |records, _now| {
            match records
                .iter_mut()
                .find(|r| r.id == id && r.version == pushed_version && r.is_pending())
            {
                Some(record) => {
                    record.sync_status = SyncStatus::Error;
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    /// Moves every rejected record of a collection back to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn retry_failed(&self, tag: CollectionTag) -> StoreResult<usize> {
        self.modify(tag, |records, _now| {
            let mut count = 0;
            for record in records
                .iter_mut()
                .filter(|r| r.sync_status == SyncStatus::Error)
            {
                record.sync_status = SyncStatus::Pending;
                count += 1;
            }
            Ok((count, count > 0))
        })
    }

    /// Settles a conflicting record.
    ///
    /// `server` is the server copy that caused the conflict; when absent the
    /// copy remembered on the record is used.
    ///
    /// - `KeepLocal`: the local copy becomes `Pending` and will be pushed.
    /// - `AcceptRemote`: the server copy replaces the local one as `Synced`.
    /// - `Merge`: local fields overlay the server object; the result is
    ///   `Pending`. A local tombstone is kept as with `KeepLocal`.
    /// - `Skip`: the record moves to `Conflict` and remembers the server copy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if the record does not exist,
    /// or [`StoreError::InvalidPayload`] if the resolution needs a server
    /// copy and none is known.
    pub fn resolve(
        &self,
        tag: CollectionTag,
        id: &str,
        resolution: ConflictResolution,
        server: Option<&EntityRecord>,
    ) -> StoreResult<EntityRecord> {
        self.modify(tag, |records, now| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::not_found(tag, id))?;

            let server_payload = server
                .map(|s| s.payload.clone())
                .or_else(|| record.conflict_payload.clone());
            let missing_server_copy = || StoreError::InvalidPayload {
                collection: tag,
                message: format!("no server copy known for {id:?}"),
            };

            let keep_local = |record: &mut EntityRecord| {
                record.conflict_payload = None;
                record.sync_status = SyncStatus::Pending;
                record.version = record.version.saturating_add(1);
                record.last_modified = now;
            };

            match resolution {
                ConflictResolution::KeepLocal => keep_local(record),
                ConflictResolution::Merge if record.is_deleted => keep_local(record),
                ConflictResolution::Merge => {
                    let server_payload = server_payload.ok_or_else(missing_server_copy)?;
                    record.payload = overlay(&server_payload, &record.payload);
                    keep_local(record);
                }
                ConflictResolution::AcceptRemote => {
                    let server_payload = server_payload.ok_or_else(missing_server_copy)?;
                    let server_version = server.map(|s| s.version).unwrap_or(0);
                    record.payload = server_payload;
                    record.is_deleted = false;
                    record.conflict_payload = None;
                    record.sync_status = SyncStatus::Synced;
                    record.version = record.version.saturating_add(1).max(server_version);
                    record.last_modified = server.map(|s| s.last_modified).unwrap_or(now);
                }
                ConflictResolution::Skip => {
                    record.conflict_payload = server_payload;
                    record.sync_status = SyncStatus::Conflict;
                }
            }

            Ok((record.clone(), true))
        })
    }

    /// Removes `Synced` records whose id the server no longer lists.
    ///
    /// Records with local changes or a rejected push are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn prune_synced(
        &self,
        tag: CollectionTag,
        remote_ids: &HashSet<String>,
    ) -> StoreResult<u64> {
        self.modify(tag, |records, _now| {
            let before = records.len();
            records.retain(|r| r.sync_status != SyncStatus::Synced || remote_ids.contains(&r.id));
            let removed = (before - records.len()) as u64;
            Ok((removed, removed > 0))
        })
    }

    /// Removes a record outright, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the blob is corrupted, or
    /// [`StoreError::StorageIo`] if the backend fails.
    pub fn purge(&self, tag: CollectionTag, id: &str) -> StoreResult<bool> {
        self.modify(tag, |records, _now| {
            let before = records.len();
            records.retain(|r| r.id != id);
            let removed = records.len() != before;
            Ok((removed, removed))
        })
    }

    /// Remembers what the server reported for a collection at its last fetch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend fails.
    pub fn record_remote_synopsis(
        &self,
        tag: CollectionTag,
        remote_updated: Option<Timestamp>,
        remote_record_count: u64,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let mut meta = match self.metadata(tag)? {
            Some(meta) => meta,
            None => {
                let records = self.read_lenient(tag)?;
                CollectionMetadata::summarize(&records, self.clock.now(), None)
            }
        };
        meta.remote_updated = remote_updated;
        meta.remote_record_count = Some(remote_record_count);
        self.kv.set(&metadata_key(tag), &encode_blob(&meta)?)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Config
    // ------------------------------------------------------------------

    /// Loads the sync config, falling back to first-run defaults when it is
    /// missing or unreadable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn load_config(&self) -> StoreResult<SyncConfig> {
        let Some(bytes) = self.kv.get(CONFIG_KEY)? else {
            return Ok(SyncConfig::default());
        };
        match decode_blob(CONFIG_KEY, &bytes) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(error = %e, "sync config unreadable; using defaults");
                Ok(SyncConfig::default())
            }
        }
    }

    /// Returns true if a sync config has been written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn has_config(&self) -> StoreResult<bool> {
        Ok(self.kv.get(CONFIG_KEY)?.is_some())
    }

    /// Persists the sync config.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend fails.
    pub fn save_config(&self, config: &SyncConfig) -> StoreResult<()> {
        self.kv.set(CONFIG_KEY, &encode_blob(config)?)?;
        Ok(())
    }

    /// Reads, changes and writes the sync config under the writer lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend fails.
    pub fn update_config<F>(&self, f: F) -> StoreResult<SyncConfig>
    where
        F: FnOnce(&mut SyncConfig),
    {
        let _guard = self.write_lock.lock();
        let mut config = self.load_config()?;
        f(&mut config);
        self.save_config(&config)?;
        Ok(config)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Wipes every collection, every metadata blob and the config.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend fails.
    pub fn clear_all(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let keys = all_keys();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.kv.remove_all(&keys)?;
        info!("cache cleared");
        Ok(())
    }

    /// Summarizes what the cache holds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageIo`] if the backend cannot be read.
    pub fn storage_stats(&self) -> StoreResult<StorageStats> {
        let mut stats = StorageStats::default();
        for tag in CollectionTag::ALL {
            for record in self.read_lenient(tag)? {
                if record.is_live() {
                    stats.total_entities += 1;
                }
                match record.sync_status {
                    SyncStatus::Pending => stats.pending_sync_count += 1,
                    SyncStatus::Conflict => stats.conflict_count += 1,
                    SyncStatus::Error => stats.error_count += 1,
                    SyncStatus::Synced => {}
                }
            }
        }

        let config = self.load_config()?;
        stats.last_sync = Some(config.last_sync_timestamp).filter(|t| !t.is_zero());

        let keys = all_keys();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        stats.cache_size_estimate = self
            .kv
            .multi_get(&keys)?
            .into_iter()
            .filter_map(|(_, value)| value)
            .map(|value| value.len() as u64)
            .sum();

        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read_strict(&self, tag: CollectionTag) -> StoreResult<Vec<EntityRecord>> {
        let key = collection_key(tag);
        match self.kv.get(&key)? {
            Some(bytes) => decode_blob(&key, &bytes),
            None => Ok(Vec::new()),
        }
    }

    fn read_lenient(&self, tag: CollectionTag) -> StoreResult<Vec<EntityRecord>> {
        match self.read_strict(tag) {
            Err(StoreError::Decode { key, message }) => {
                warn!(%key, %message, "collection unreadable; serving empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Runs a read-modify-write on one collection under the writer lock.
    ///
    /// `f` returns its result and whether it changed anything; unchanged
    /// collections are not rewritten.
    fn modify<R, F>(&self, tag: CollectionTag, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Vec<EntityRecord>, Timestamp) -> StoreResult<(R, bool)>,
    {
        let _guard = self.write_lock.lock();
        let mut records = self.read_strict(tag)?;
        let now = self.clock.now();
        let (result, changed) = f(&mut records, now)?;
        if changed {
            self.write_collection(tag, &records, now)?;
        }
        Ok(result)
    }

    fn write_collection(
        &self,
        tag: CollectionTag,
        records: &[EntityRecord],
        now: Timestamp,
    ) -> StoreResult<()> {
        let previous = self.metadata(tag)?;
        let meta = CollectionMetadata::summarize(records, now, previous.as_ref());

        let records_key = collection_key(tag);
        let meta_key = metadata_key(tag);
        let records_blob = encode_blob(&records)?;
        let meta_blob = encode_blob(&meta)?;

        self.kv.multi_set(&[
            (records_key.as_str(), records_blob.as_slice()),
            (meta_key.as_str(), meta_blob.as_slice()),
        ])?;
        Ok(())
    }

    fn check_data_version(&self) -> StoreResult<()> {
        let Some(bytes) = self.kv.get(CONFIG_KEY)? else {
            return Ok(());
        };

        match decode_blob::<SyncConfig>(CONFIG_KEY, &bytes) {
            Ok(config) if config.data_version == DATA_VERSION => Ok(()),
            Ok(config) => {
                info!(
                    found = config.data_version,
                    expected = DATA_VERSION,
                    "cache data version changed; wiping collections"
                );
                let keys: Vec<String> = CollectionTag::ALL
                    .into_iter()
                    .flat_map(|tag| [collection_key(tag), metadata_key(tag)])
                    .collect();
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                self.kv.remove_all(&keys)?;

                let mut fresh = SyncConfig::new(config.conflict_resolution_strategy);
                fresh.user_id = config.user_id;
                self.save_config(&fresh)
            }
            Err(e) => {
                warn!(error = %e, "sync config unreadable; resetting to defaults");
                self.save_config(&SyncConfig::default())
            }
        }
    }
}
