//! The sync orchestrator.

use crate::config::OrchestratorConfig;
use crate::error::{SyncError, SyncResult};
use crate::outcome::{ConflictRecord, SyncOutcome};
use crate::remote::{CollectionSynopsis, RemoteDataService, RemoteDocument};
use offcache_core::{
    CollectionDescriptor, CollectionRegistry, CollectionTag, ConflictResolution, ConflictStrategy,
    EntityRecord, EntityStore, SyncConfig, SyncStatus, Timestamp,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Statistics about sync runs since the orchestrator was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Runs that completed, fully or partially.
    pub syncs_completed: u64,
    /// Of those, initial syncs.
    pub initial_syncs: u64,
    /// Records added or replaced by pulls.
    pub items_pulled: u64,
    /// Local changes the server accepted.
    pub items_pushed: u64,
    /// Conflicts found.
    pub conflicts_encountered: u64,
    /// Completion time of the last run.
    pub last_sync: Option<Timestamp>,
    /// Last error reported by a run.
    pub last_error: Option<String>,
}

/// The single-flight slot, released on drop.
struct Slot<'a>(&'a AtomicBool);

impl<'a> Slot<'a> {
    fn claim(running: &'a AtomicBool) -> SyncResult<Self> {
        running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::AlreadyInProgress)?;
        Ok(Self(running))
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Clears the persisted flag, then releases the slot, on every exit.
struct SyncGuard<'a> {
    _slot: Slot<'a>,
    store: &'a EntityStore,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.update_config(|c| c.sync_in_progress = false) {
            warn!(error = %e, "failed to clear sync_in_progress");
        }
    }
}

/// Drives initial sync, incremental sync and the outbound push.
///
/// Runs are single-flight: a call made while another run is active fails
/// with [`SyncError::AlreadyInProgress`] instead of queuing. Readers of the
/// store are never blocked by a run.
pub struct SyncOrchestrator<R: RemoteDataService> {
    store: Arc<EntityStore>,
    remote: R,
    registry: CollectionRegistry,
    config: OrchestratorConfig,
    running: AtomicBool,
    interrupted: bool,
    stats: RwLock<SyncStats>,
}

impl<R: RemoteDataService> SyncOrchestrator<R> {
    /// Creates an orchestrator.
    ///
    /// Writes the first-run sync config if none exists. A persisted
    /// `sync_in_progress` flag means the previous process died mid-sync; it
    /// is cleared and reported by [`SyncOrchestrator::was_interrupted`].
    ///
    /// # Errors
    ///
    /// Returns an error if the sync config cannot be read or written.
    pub fn new(
        store: Arc<EntityStore>,
        remote: R,
        registry: CollectionRegistry,
        config: OrchestratorConfig,
    ) -> SyncResult<Self> {
        if !store.has_config()? {
            store.save_config(&SyncConfig::new(config.default_strategy))?;
        }

        let persisted = store.load_config()?;
        let interrupted = persisted.sync_in_progress;
        if interrupted {
            warn!(
                last_sync = %persisted.last_sync_timestamp,
                "previous sync was interrupted; clearing flag"
            );
            store.update_config(|c| c.sync_in_progress = false)?;
        }

        Ok(Self {
            store,
            remote,
            registry,
            config,
            running: AtomicBool::new(false),
            interrupted,
            stats: RwLock::new(SyncStats::default()),
        })
    }

    /// The entity store.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// The remote data service.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The collections this orchestrator syncs.
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Runtime configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Statistics since creation.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true if the previous process died during a sync.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Returns true while a run is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The persisted conflict strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync config cannot be read.
    pub fn conflict_strategy(&self) -> SyncResult<ConflictStrategy> {
        Ok(self.store.load_config()?.conflict_resolution_strategy)
    }

    /// Persists a new conflict strategy for later runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync config cannot be written.
    pub fn set_conflict_strategy(&self, strategy: ConflictStrategy) -> SyncResult<()> {
        self.store
            .update_config(|c| c.conflict_resolution_strategy = strategy)?;
        Ok(())
    }

    /// Fetches every registered collection, then pushes pending changes.
    ///
    /// User-scoped collections are fetched for `user_id` and skipped when it
    /// is `None`; the user is remembered for incremental syncs. A failed
    /// collection is reported in the outcome and does not stop the others.
    /// The run succeeds if it added anything or reported no error.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] if another run is active, or
    /// [`SyncError::Store`] if local storage fails.
    pub fn perform_initial_sync(&self, user_id: Option<&str>) -> SyncResult<SyncOutcome> {
        self.run("initial", true, |outcome| {
            let config = self
                .store
                .update_config(|c| c.user_id = user_id.map(str::to_owned))?;
            let strategy = config.conflict_resolution_strategy;

            // Read before fetching, so changes made during the fetch stay newer.
            let synopsis = match self.remote.fetch_change_synopsis(&self.registry.tags()) {
                Ok(synopsis) => synopsis,
                Err(e) => {
                    debug!(error = %e, "synopsis unavailable; recording fetched documents");
                    HashMap::new()
                }
            };

            for descriptor in self.registry.iter() {
                let Some(scope) = scope_user(descriptor, user_id) else {
                    debug!(collection = %descriptor.tag, "no user; skipping user-scoped collection");
                    continue;
                };
                let seen = synopsis.get(&descriptor.tag).copied();
                self.pull_step(descriptor, scope, seen, strategy, outcome)?;
            }

            let pushed = self.push_step(outcome)?;
            self.pull_pushed(&pushed, user_id, strategy, outcome)?;

            let now = self.store.now();
            self.store.update_config(|c| {
                c.last_sync_timestamp = now;
                c.last_full_sync = now;
            })?;

            outcome.success = outcome.items_added > 0 || outcome.errors.is_empty();
            Ok(())
        })
    }

    /// Refetches the collections the change synopsis marks dirty, then
    /// pushes pending changes. The run succeeds only if nothing failed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] if another run is active, or
    /// [`SyncError::Store`] if local storage fails.
    pub fn perform_incremental_sync(&self) -> SyncResult<SyncOutcome> {
        self.run("incremental", false, |outcome| {
            let config = self.store.load_config()?;
            let strategy = config.conflict_resolution_strategy;

            for (descriptor, synopsis) in self.dirty_collections(&config, outcome)? {
                let Some(scope) = scope_user(descriptor, config.user_id.as_deref()) else {
                    continue;
                };
                self.pull_step(descriptor, scope, Some(synopsis), strategy, outcome)?;
            }

            let pushed = self.push_step(outcome)?;
            self.pull_pushed(&pushed, config.user_id.as_deref(), strategy, outcome)?;

            let now = self.store.now();
            self.store.update_config(|c| c.last_sync_timestamp = now)?;

            outcome.success = outcome.errors.is_empty();
            Ok(())
        })
    }

    /// Cheap check callers make before paying for a sync.
    ///
    /// True if anything is pending, if the last sync is older than the
    /// staleness window, or if the remote synopsis shows a change. An
    /// unreachable remote counts as "no change"; a local storage failure
    /// counts as "sync needed".
    pub fn is_sync_needed(&self) -> bool {
        match self.check_sync_needed() {
            Ok(needed) => needed,
            Err(e) => {
                warn!(error = %e, "could not evaluate sync need; assuming needed");
                true
            }
        }
    }

    /// Runs `f` while holding the single-flight slot. No sync can be active
    /// or start until `f` returns. The persisted in-progress flag is left
    /// alone, since no sync runs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyInProgress`] if a run is active, or the
    /// error `f` returns.
    pub fn exclusive<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&EntityStore) -> SyncResult<T>,
    {
        let _slot = Slot::claim(&self.running)?;
        f(&self.store)
    }

    /// Records waiting for a conflict resolution in one collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the backend cannot be read.
    pub fn conflicts(&self, tag: CollectionTag) -> SyncResult<Vec<EntityRecord>> {
        Ok(self.store.with_status(tag, SyncStatus::Conflict)?)
    }

    /// Records waiting for a conflict resolution, by collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the backend cannot be read.
    pub fn all_conflicts(&self) -> SyncResult<BTreeMap<CollectionTag, Vec<EntityRecord>>> {
        let mut all = BTreeMap::new();
        for tag in CollectionTag::ALL {
            let conflicts = self.conflicts(tag)?;
            if !conflicts.is_empty() {
                all.insert(tag, conflicts);
            }
        }
        Ok(all)
    }

    /// Settles a record left in `Conflict` by a previous run.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotInConflict`] if the record is not in
    /// conflict, or [`SyncError::Store`] if the store fails.
    pub fn resolve_conflict(
        &self,
        tag: CollectionTag,
        id: &str,
        resolution: ConflictResolution,
    ) -> SyncResult<EntityRecord> {
        let in_conflict = self
            .store
            .get_raw(tag, id)?
            .is_some_and(|r| r.sync_status == SyncStatus::Conflict);
        if !in_conflict {
            return Err(SyncError::NotInConflict {
                collection: tag,
                id: id.to_string(),
            });
        }

        let record = self.store.resolve(tag, id, resolution, None)?;
        info!(collection = %tag, %id, ?resolution, "conflict resolved");
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Run plumbing
    // ------------------------------------------------------------------

    fn begin(&self) -> SyncResult<SyncGuard<'_>> {
        let guard = SyncGuard {
            _slot: Slot::claim(&self.running)?,
            store: &self.store,
        };
        self.store.update_config(|c| c.sync_in_progress = true)?;
        Ok(guard)
    }

    fn run<F>(&self, kind: &'static str, initial: bool, body: F) -> SyncResult<SyncOutcome>
    where
        F: FnOnce(&mut SyncOutcome) -> SyncResult<()>,
    {
        let _guard = self.begin()?;
        let started = Instant::now();
        info!(kind, "sync started");

        let mut outcome = SyncOutcome::default();
        let result = body(&mut outcome);
        outcome.duration = started.elapsed();

        match result {
            Ok(()) => {
                self.record_stats(&outcome, initial);
                info!(
                    kind,
                    success = outcome.success,
                    added = outcome.items_added,
                    updated = outcome.items_updated,
                    deleted = outcome.items_deleted,
                    pushed = outcome.items_pushed,
                    conflicts = outcome.conflicts.len(),
                    errors = outcome.errors.len(),
                    "sync finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(kind, error = %e, "sync aborted");
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn record_stats(&self, outcome: &SyncOutcome, initial: bool) {
        let now = self.store.now();
        let mut stats = self.stats.write();
        stats.syncs_completed += 1;
        if initial {
            stats.initial_syncs += 1;
        }
        stats.items_pulled += outcome.items_added + outcome.items_updated;
        stats.items_pushed += outcome.items_pushed;
        stats.conflicts_encountered += outcome.conflicts.len() as u64;
        stats.last_sync = Some(now);
        stats.last_error = outcome.errors.last().cloned();
    }

    // ------------------------------------------------------------------
    // Change detection
    // ------------------------------------------------------------------

    fn check_sync_needed(&self) -> SyncResult<bool> {
        let pending: usize = self.store.all_pending()?.values().map(Vec::len).sum();
        if pending > 0 {
            debug!(pending, "sync needed: pending changes");
            return Ok(true);
        }

        let config = self.store.load_config()?;
        let age = self.store.now().duration_since(config.last_sync_timestamp);
        if config.never_synced() || age > self.config.staleness_window {
            debug!(age_ms = age.as_millis() as u64, "sync needed: cache is stale");
            return Ok(true);
        }

        let tags = self.registry.tags();
        let synopsis = match self.remote.fetch_change_synopsis(&tags) {
            Ok(synopsis) => synopsis,
            Err(e) => {
                debug!(error = %e, "synopsis unavailable; assuming no remote change");
                return Ok(false);
            }
        };

        for descriptor in self.registry.iter() {
            if scope_user(descriptor, config.user_id.as_deref()).is_none() {
                continue;
            }
            if let Some(remote) = synopsis.get(&descriptor.tag) {
                if self.is_dirty(descriptor.tag, remote)? {
                    debug!(collection = %descriptor.tag, "sync needed: remote changed");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn dirty_collections(
        &self,
        config: &SyncConfig,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<Vec<(&CollectionDescriptor, CollectionSynopsis)>> {
        let tags = self.registry.tags();
        let synopsis = match self.remote.fetch_change_synopsis(&tags) {
            Ok(synopsis) => synopsis,
            Err(source) => {
                let err = SyncError::RemoteSynopsis(source);
                warn!(error = %err, "skipping pull");
                outcome.errors.push(err.to_string());
                return Ok(Vec::new());
            }
        };

        let mut dirty = Vec::new();
        for descriptor in self.registry.iter() {
            if scope_user(descriptor, config.user_id.as_deref()).is_none() {
                continue;
            }
            let Some(remote) = synopsis.get(&descriptor.tag) else {
                continue;
            };
            if self.is_dirty(descriptor.tag, remote)? {
                dirty.push((descriptor, *remote));
            }
        }
        debug!(dirty = dirty.len(), "change synopsis compared");
        Ok(dirty)
    }

    /// A collection is dirty when it was never stored locally, or when the
    /// remote's own stamp or count moved since the last fetch. Only remote
    /// stamps are compared; the local clock plays no part.
    fn is_dirty(&self, tag: CollectionTag, remote: &CollectionSynopsis) -> SyncResult<bool> {
        let Some(meta) = self.store.metadata(tag)? else {
            return Ok(true);
        };

        let newer = meta
            .remote_updated
            .map_or(true, |seen| remote.last_updated > seen);
        let recounted = meta
            .remote_record_count
            .is_some_and(|seen| seen != remote.record_count);
        Ok(newer || recounted)
    }

    // ------------------------------------------------------------------
    // Pull
    // ------------------------------------------------------------------

    /// Pulls one collection, turning non-fatal failures into outcome errors.
    fn pull_step(
        &self,
        descriptor: &CollectionDescriptor,
        user_id: Option<&str>,
        synopsis: Option<CollectionSynopsis>,
        strategy: ConflictStrategy,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        match self.pull_collection(descriptor, user_id, synopsis, strategy, outcome) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(collection = %descriptor.tag, error = %e, "collection skipped");
                outcome.errors.push(e.to_string());
                Ok(())
            }
        }
    }

    fn pull_collection(
        &self,
        descriptor: &CollectionDescriptor,
        user_id: Option<&str>,
        synopsis: Option<CollectionSynopsis>,
        strategy: ConflictStrategy,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let tag = descriptor.tag;
        let documents = self
            .remote
            .fetch_collection(tag, user_id)
            .map_err(|source| SyncError::RemoteFetch {
                collection: tag,
                source,
            })?;

        let fetched = documents.len() as u64;
        let latest = documents.iter().map(|d| d.last_modified).max();
        self.apply_documents(descriptor, documents, strategy, outcome)?;

        let (remote_updated, remote_count) = match synopsis {
            Some(s) => (Some(s.last_updated), s.record_count),
            None => (latest, fetched),
        };
        self.store
            .record_remote_synopsis(tag, remote_updated, remote_count)?;
        debug!(collection = %tag, fetched, "collection pulled");
        Ok(())
    }

    /// Merges a fetched collection into the store.
    ///
    /// Documents whose local copy carries diverging un-pushed changes are
    /// settled as conflicts; everything else goes through the store's merge.
    /// Local `Synced` records the server no longer lists are removed.
    fn apply_documents(
        &self,
        descriptor: &CollectionDescriptor,
        documents: Vec<RemoteDocument>,
        strategy: ConflictStrategy,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let tag = descriptor.tag;
        let local: HashMap<String, EntityRecord> = self
            .store
            .all_records(tag)?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut remote_ids = HashSet::with_capacity(documents.len());
        let mut incoming = Vec::with_capacity(documents.len());
        let mut conflicts = Vec::new();

        for doc in documents {
            remote_ids.insert(doc.id.clone());

            if let Err(reason) = descriptor.validate(&doc.payload) {
                let err = SyncError::InvalidDocument {
                    collection: tag,
                    id: doc.id.clone(),
                    reason,
                };
                warn!(error = %err, "document skipped");
                outcome.errors.push(err.to_string());
                continue;
            }

            match local.get(&doc.id) {
                Some(existing) if existing.has_local_changes() && diverges(existing, &doc) => {
                    conflicts.push((existing.clone(), doc));
                }
                _ => incoming.push(EntityRecord::from_server(
                    tag,
                    doc.id,
                    doc.payload,
                    doc.version,
                    doc.last_modified,
                )),
            }
        }

        let summary = self.store.store(tag, incoming)?;
        outcome.items_added += summary.added;
        outcome.items_updated += summary.updated;
        outcome.items_deleted += self.store.prune_synced(tag, &remote_ids)?;

        for (existing, doc) in conflicts {
            self.settle_conflict(tag, existing, doc, strategy, outcome)?;
        }
        Ok(())
    }

    fn settle_conflict(
        &self,
        tag: CollectionTag,
        local: EntityRecord,
        doc: RemoteDocument,
        strategy: ConflictStrategy,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let resolution = strategy.resolution();
        let server = EntityRecord::from_server(
            tag,
            doc.id.clone(),
            doc.payload,
            doc.version,
            doc.last_modified,
        );
        self.store.resolve(tag, &doc.id, resolution, Some(&server))?;
        if resolution == ConflictResolution::AcceptRemote {
            outcome.items_updated += 1;
        }

        info!(collection = %tag, id = %doc.id, ?resolution, "conflict detected");
        outcome.conflicts.push(ConflictRecord {
            id: doc.id,
            collection: tag,
            local_payload: local.payload,
            local_deleted: local.is_deleted,
            server_payload: server.payload,
            resolution,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    /// Pushes every pending record. Returns the collections the server
    /// accepted at least one change for.
    fn push_step(&self, outcome: &mut SyncOutcome) -> SyncResult<BTreeSet<CollectionTag>> {
        let mut accepted = BTreeSet::new();

        for (tag, records) in self.store.all_pending()? {
            for record in records {
                let result = if record.is_deleted {
                    self.remote.delete(tag, &record.id)
                } else {
                    self.remote.upsert(tag, &record.id, &record.payload)
                };

                match result {
                    Ok(()) => {
                        accepted.insert(tag);
                        outcome.items_pushed += 1;
                        let ack = self.store.acknowledge(
                            tag,
                            &record.id,
                            record.version,
                            self.config.purge_acknowledged_deletes,
                        )?;
                        debug!(collection = %tag, id = %record.id, ?ack, "push acknowledged");
                    }
                    Err(source) => {
                        let retryable = source.is_retryable();
                        let err = SyncError::RemotePush {
                            collection: tag,
                            id: record.id.clone(),
                            source,
                        };
                        warn!(error = %err, retryable, "push failed");
                        if !retryable {
                            self.store.mark_rejected(tag, &record.id, record.version)?;
                        }
                        outcome.errors.push(err.to_string());
                    }
                }
            }
        }
        Ok(accepted)
    }

    /// Pulls the collections this run pushed to. The run's own writes are
    /// absorbed together with whatever other clients wrote meanwhile, and
    /// the recorded synopsis never covers a change that was not fetched.
    fn pull_pushed(
        &self,
        pushed: &BTreeSet<CollectionTag>,
        user_id: Option<&str>,
        strategy: ConflictStrategy,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        if pushed.is_empty() {
            return Ok(());
        }

        let tags: Vec<CollectionTag> = pushed.iter().copied().collect();
        let synopsis = match self.remote.fetch_change_synopsis(&tags) {
            Ok(synopsis) => synopsis,
            Err(e) => {
                debug!(error = %e, "synopsis after push unavailable; collections stay dirty");
                return Ok(());
            }
        };

        for descriptor in self.registry.iter() {
            let Some(seen) = synopsis.get(&descriptor.tag).copied() else {
                continue;
            };
            let Some(scope) = scope_user(descriptor, user_id) else {
                continue;
            };
            self.pull_step(descriptor, scope, Some(seen), strategy, outcome)?;
        }
        Ok(())
    }
}

/// `Some(user)` for the user a collection should be fetched for, `None` if
/// the collection must be skipped.
fn scope_user<'u>(
    descriptor: &CollectionDescriptor,
    user_id: Option<&'u str>,
) -> Option<Option<&'u str>> {
    if descriptor.is_user_scoped() {
        user_id.map(Some)
    } else {
        Some(None)
    }
}

fn diverges(local: &EntityRecord, server: &RemoteDocument) -> bool {
    local.is_deleted || local.payload != server.payload
}
