//! The data access facade.

use crate::error::CacheResult;
use crate::typed::TypedCollection;
use offcache_core::{
    Clock, CollectionDescriptor, CollectionRegistry, CollectionTag,
    ConflictResolution, Document, Entity, EntityRecord, EntityStore, StorageStats, StoreError,
    SyncConfig, SystemClock,
};
use offcache_storage::{InMemoryStore, KeyValueStore};
use offcache_sync::{
    OrchestratorConfig, RemoteDataService, SyncOrchestrator, SyncOutcome,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of ids assigned to records created offline without an id.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Builder for [`OfflineCache`].
pub struct OfflineCacheBuilder {
    kv: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    registry: CollectionRegistry,
    config: OrchestratorConfig,
}

impl OfflineCacheBuilder {
    fn new() -> Self {
        Self {
            kv: None,
            clock: Arc::new(SystemClock),
            registry: CollectionRegistry::standard(),
            config: OrchestratorConfig::default(),
        }
    }

    /// Sets the key-value backend. Defaults to an [`InMemoryStore`].
    pub fn kv(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the collection registry. Defaults to
    /// [`CollectionRegistry::standard`].
    pub fn registry(mut self, registry: CollectionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the orchestrator configuration.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens the store and wires the orchestrator to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or the sync config
    /// cannot be initialized.
    pub fn build<R: RemoteDataService>(self, remote: R) -> CacheResult<OfflineCache<R>> {
        let kv = self
            .kv
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()) as Arc<dyn KeyValueStore>);
        let store = Arc::new(EntityStore::open(kv, self.clock)?);
        let orchestrator = SyncOrchestrator::new(store.clone(), remote, self.registry, self.config)?;
        Ok(OfflineCache {
            store,
            orchestrator,
        })
    }
}

/// The interface application code uses.
///
/// # Reads
///
/// Reads never touch the network and never fail: a backend or decode error
/// is logged and served as "nothing cached". Records whose payload does not
/// deserialize into the requested type are skipped.
///
/// # Writes
///
/// `create`, `update` and `delete` write to the local store and leave the
/// record pending until a sync pushes it.
pub struct OfflineCache<R: RemoteDataService> {
    store: Arc<EntityStore>,
    orchestrator: SyncOrchestrator<R>,
}

impl OfflineCache<offcache_sync::InMemoryRemote> {
    /// Starts building a cache.
    pub fn builder() -> OfflineCacheBuilder {
        OfflineCacheBuilder::new()
    }
}

impl<R: RemoteDataService> OfflineCache<R> {
    /// The underlying entity store.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// The sync orchestrator.
    pub fn orchestrator(&self) -> &SyncOrchestrator<R> {
        &self.orchestrator
    }

    /// The registered collections.
    pub fn registry(&self) -> &CollectionRegistry {
        self.orchestrator.registry()
    }

    /// A typed view of `T`'s collection.
    pub fn collection<T: Entity>(&self) -> TypedCollection<'_, T, R> {
        TypedCollection::new(self)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every live record of a collection, deserialized into `T`.
    pub fn get_all<T: DeserializeOwned>(&self, tag: CollectionTag) -> Vec<T> {
        self.records(tag)
            .iter()
            .filter_map(|record| decode_or_skip(record))
            .collect()
    }

    /// A live record by id, deserialized into `T`.
    pub fn get_by_id<T: DeserializeOwned>(&self, tag: CollectionTag, id: &str) -> Option<T> {
        match self.store.get(tag, id) {
            Ok(record) => record.as_ref().and_then(decode_or_skip),
            Err(e) => {
                warn!(collection = %tag, %id, error = %e, "read failed; serving nothing");
                None
            }
        }
    }

    /// Live records of a collection that deserialize into `T` and satisfy
    /// `predicate`.
    pub fn get_by_predicate<T, P>(&self, tag: CollectionTag, predicate: P) -> Vec<T>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        self.get_all(tag)
            .into_iter()
            .filter(|item| predicate(item))
            .collect()
    }

    /// Live records of a collection with their sync bookkeeping.
    pub fn records(&self, tag: CollectionTag) -> Vec<EntityRecord> {
        self.store.get_all(tag).unwrap_or_else(|e| {
            warn!(collection = %tag, error = %e, "read failed; serving nothing");
            Vec::new()
        })
    }

    /// Number of records waiting to be pushed.
    pub fn pending_count(&self) -> usize {
        match self.store.all_pending() {
            Ok(pending) => pending.values().map(Vec::len).sum(),
            Err(e) => {
                warn!(error = %e, "pending count unavailable");
                0
            }
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Creates (or overwrites) a record and returns its id.
    ///
    /// The id is read from the collection's id field. A payload without one
    /// gets a `local-<uuid>` id, written back into the payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredCollection`] for a collection
    /// outside the registry, [`StoreError::InvalidPayload`] if the payload
    /// fails validation or needs an id but is not an object, or a storage
    /// error.
    pub fn create(&self, tag: CollectionTag, mut payload: Document) -> CacheResult<String> {
        let descriptor = self.descriptor(tag)?;

        let id = match descriptor.id_of(&payload) {
            Some(id) => id,
            None => {
                let id = format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4());
                let Some(fields) = payload.as_object_mut() else {
                    return Err(StoreError::InvalidPayload {
                        collection: tag,
                        message: "payload must be an object".into(),
                    }
                    .into());
                };
                fields.insert(descriptor.id_field.to_string(), Document::String(id.clone()));
                id
            }
        };

        check(descriptor, &payload)?;
        let record = self.store.put_local(tag, &id, payload)?;
        debug!(collection = %tag, %id, version = record.version, "created");
        Ok(id)
    }

    /// Applies a merge patch to a live record.
    ///
    /// Object fields in `patch` replace the record's fields, `null` removes
    /// a field, and a non-object patch replaces the whole payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] if no live record has this id,
    /// [`StoreError::InvalidPayload`] if the patched payload fails
    /// validation, or a storage error.
    pub fn update(&self, tag: CollectionTag, id: &str, patch: &Document) -> CacheResult<()> {
        let descriptor = self.descriptor(tag)?;
        let record = self
            .store
            .update_local_checked(tag, id, patch, |patched| descriptor.validate(patched))?;
        debug!(collection = %tag, %id, version = record.version, "updated");
        Ok(())
    }

    /// Deletes a record locally; the delete is pushed by the next sync.
    /// Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnregisteredCollection`] or a storage error.
    pub fn delete(&self, tag: CollectionTag, id: &str) -> CacheResult<()> {
        self.descriptor(tag)?;
        self.store.soft_delete(tag, id)?;
        debug!(collection = %tag, %id, "deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Runs an incremental sync if one is needed; otherwise returns a
    /// successful no-op outcome.
    ///
    /// Remote failures are reported inside the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if another sync is running or local storage fails.
    pub fn trigger_sync(&self) -> CacheResult<SyncOutcome> {
        if !self.orchestrator.is_sync_needed() {
            debug!("sync not needed");
            return Ok(SyncOutcome::noop());
        }
        Ok(self.orchestrator.perform_incremental_sync()?)
    }

    /// Runs a full sync for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if another sync is running or local storage fails.
    pub fn initial_sync(&self, user_id: Option<&str>) -> CacheResult<SyncOutcome> {
        Ok(self.orchestrator.perform_initial_sync(user_id)?)
    }

    /// Returns true if a sync is worth running.
    pub fn is_sync_needed(&self) -> bool {
        self.orchestrator.is_sync_needed()
    }

    /// Records of a collection waiting for a conflict resolution.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn conflicts(&self, tag: CollectionTag) -> CacheResult<Vec<EntityRecord>> {
        Ok(self.orchestrator.conflicts(tag)?)
    }

    /// Records waiting for a conflict resolution, by collection.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn all_conflicts(&self) -> CacheResult<BTreeMap<CollectionTag, Vec<EntityRecord>>> {
        Ok(self.orchestrator.all_conflicts()?)
    }

    /// Settles a record left in conflict by a sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not in conflict or storage fails.
    pub fn resolve_conflict(
        &self,
        tag: CollectionTag,
        id: &str,
        resolution: ConflictResolution,
    ) -> CacheResult<EntityRecord> {
        Ok(self.orchestrator.resolve_conflict(tag, id, resolution)?)
    }

    /// Queues records the server rejected for another push.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn retry_failed(&self, tag: CollectionTag) -> CacheResult<usize> {
        Ok(self.store.retry_failed(tag)?)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Summarizes what the cache holds.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn get_storage_stats(&self) -> CacheResult<StorageStats> {
        Ok(self.store.storage_stats()?)
    }

    /// Wipes every collection and the sync config, as on sign-out.
    ///
    /// A first-run config with the configured default strategy is written
    /// back, so the next sync starts from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if a sync is running or storage fails.
    pub fn clear_all_data(&self) -> CacheResult<()> {
        let strategy = self.orchestrator.config().default_strategy;
        self.orchestrator.exclusive(|store| {
            store.clear_all()?;
            store.save_config(&SyncConfig::new(strategy))?;
            Ok(())
        })?;
        info!("all cached data cleared");
        Ok(())
    }

    fn descriptor(&self, tag: CollectionTag) -> CacheResult<&CollectionDescriptor> {
        self.orchestrator
            .registry()
            .get(tag)
            .ok_or_else(|| StoreError::UnregisteredCollection(tag).into())
    }
}

fn check(descriptor: &CollectionDescriptor, payload: &Document) -> CacheResult<()> {
    descriptor.validate(payload).map_err(|message| {
        StoreError::InvalidPayload {
            collection: descriptor.tag,
            message,
        }
        .into()
    })
}

fn decode_or_skip<T: DeserializeOwned>(record: &EntityRecord) -> Option<T> {
    match record.decode() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                collection = %record.entity_type,
                id = %record.id,
                error = %e,
                "record does not match the requested type; skipping"
            );
            None
        }
    }
}
