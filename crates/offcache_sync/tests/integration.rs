//! End-to-end tests of the orchestrator against an in-memory remote.

use offcache_core::{
    CollectionRegistry, CollectionTag, ConflictResolution, ConflictStrategy, Document, Entity,
    EntityStore, ManualClock, SyncStatus, Timestamp,
};
use offcache_storage::InMemoryStore;
use offcache_sync::{
    CollectionSynopsis, InMemoryRemote, OrchestratorConfig, RemoteDataService, RemoteDocument,
    RemoteResult, SyncError, SyncOrchestrator,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

struct Setup {
    orchestrator: SyncOrchestrator<InMemoryRemote>,
    store: Arc<EntityStore>,
    remote: InMemoryRemote,
    clock: Arc<ManualClock>,
}

fn setup_with(registry: CollectionRegistry) -> Setup {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
    let store = Arc::new(EntityStore::open(Arc::new(InMemoryStore::new()), clock.clone()).unwrap());
    let remote = InMemoryRemote::new(clock.clone());
    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        remote.clone(),
        registry,
        OrchestratorConfig::default(),
    )
    .unwrap();
    Setup {
        orchestrator,
        store,
        remote,
        clock,
    }
}

fn setup() -> Setup {
    setup_with(CollectionRegistry::standard())
}

#[test]
fn local_create_then_concurrent_edit_yields_one_conflict() {
    let s = setup();

    let created = s
        .store
        .put_local(CollectionTag::Stories, "r1", json!({"title": "A"}))
        .unwrap();
    assert_eq!(created.sync_status, SyncStatus::Pending);
    assert_eq!(created.version, 1);

    let outcome = s.orchestrator.perform_initial_sync(None).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_pushed, 1);
    let synced = s.store.get(CollectionTag::Stories, "r1").unwrap().unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Synced);

    s.clock.advance(MINUTE);
    s.remote
        .put(CollectionTag::Stories, "r1", json!({"title": "Remote"}));
    s.clock.advance(MINUTE);
    s.store
        .update_local(CollectionTag::Stories, "r1", &json!({"title": "Local"}))
        .unwrap();

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.id, "r1");
    assert_eq!(conflict.collection, CollectionTag::Stories);
    assert_eq!(conflict.local_payload, json!({"title": "Local"}));
    assert_eq!(conflict.server_payload, json!({"title": "Remote"}));
    assert_eq!(conflict.resolution, ConflictResolution::Skip);

    // Neither side was discarded.
    let local = s.store.get(CollectionTag::Stories, "r1").unwrap().unwrap();
    assert_eq!(local.payload, json!({"title": "Local"}));
    assert_eq!(local.sync_status, SyncStatus::Conflict);
    assert_eq!(
        s.remote.document(CollectionTag::Stories, "r1").unwrap().payload,
        json!({"title": "Remote"})
    );
    assert_eq!(outcome.items_pushed, 0);

    // Settling it lets the local side through.
    s.orchestrator
        .resolve_conflict(CollectionTag::Stories, "r1", ConflictResolution::KeepLocal)
        .unwrap();
    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        s.remote.document(CollectionTag::Stories, "r1").unwrap().payload,
        json!({"title": "Local"})
    );
}

#[test]
fn manual_conflict_accept_remote() {
    let s = setup();
    s.remote.put(CollectionTag::Teams, "t1", json!({"name": "Owls"}));
    s.orchestrator.perform_initial_sync(None).unwrap();

    s.clock.advance(MINUTE);
    s.remote.put(CollectionTag::Teams, "t1", json!({"name": "Hawks"}));
    s.store
        .update_local(CollectionTag::Teams, "t1", &json!({"name": "Doves"}))
        .unwrap();
    s.orchestrator.perform_incremental_sync().unwrap();

    let conflicts = s.orchestrator.all_conflicts().unwrap();
    assert_eq!(conflicts[&CollectionTag::Teams].len(), 1);

    let record = s
        .orchestrator
        .resolve_conflict(CollectionTag::Teams, "t1", ConflictResolution::AcceptRemote)
        .unwrap();
    assert_eq!(record.payload, json!({"name": "Hawks"}));
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert!(s.orchestrator.all_conflicts().unwrap().is_empty());
}

#[test]
fn repeated_incremental_sync_is_idempotent() {
    let s = setup();
    s.remote.put(CollectionTag::Games, "g1", json!({"home": 1}));
    s.remote.put(CollectionTag::Games, "g2", json!({"home": 2}));
    s.orchestrator.perform_initial_sync(None).unwrap();

    s.clock.advance(MINUTE);
    s.remote.put(CollectionTag::Games, "g1", json!({"home": 3}));

    let first = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(first.items_updated, 1);

    s.clock.advance(MINUTE);
    let second = s.orchestrator.perform_incremental_sync().unwrap();
    assert!(second.success);
    assert_eq!(second.items_added, 0);
    assert_eq!(second.items_updated, 0);
    assert_eq!(second.items_deleted, 0);
    assert!(!second.has_changes());
}

#[test]
fn staleness_window_drives_sync_needed() {
    let s = setup();
    assert!(s.orchestrator.is_sync_needed(), "never synced");

    s.orchestrator.perform_initial_sync(None).unwrap();

    s.clock.advance(10 * MINUTE);
    assert!(!s.orchestrator.is_sync_needed());

    s.clock.advance(80 * MINUTE);
    assert!(s.orchestrator.is_sync_needed());
}

#[test]
fn pending_and_remote_changes_drive_sync_needed() {
    let s = setup();
    s.orchestrator.perform_initial_sync(None).unwrap();
    s.clock.advance(MINUTE);
    assert!(!s.orchestrator.is_sync_needed());

    s.store
        .put_local(CollectionTag::Rewards, "r", json!({}))
        .unwrap();
    assert!(s.orchestrator.is_sync_needed());
    s.orchestrator.perform_incremental_sync().unwrap();
    assert!(!s.orchestrator.is_sync_needed());

    s.clock.advance(MINUTE);
    s.remote.put(CollectionTag::Coaches, "c", json!({}));
    assert!(s.orchestrator.is_sync_needed());

    // An unreachable remote counts as no remote change.
    s.remote.set_online(false);
    assert!(!s.orchestrator.is_sync_needed());
}

#[test]
fn initial_sync_partial_failure_still_succeeds() {
    let s = setup();
    s.remote.put(CollectionTag::Teams, "t1", json!({}));
    s.remote.put(CollectionTag::Games, "g1", json!({}));
    s.remote.fail_fetch(CollectionTag::Games, true);

    let outcome = s.orchestrator.perform_initial_sync(None).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_added, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("games"));

    let config = s.store.load_config().unwrap();
    assert!(!config.last_full_sync.is_zero());
    assert_eq!(config.last_sync_timestamp, config.last_full_sync);
}

#[test]
fn initial_sync_with_no_progress_fails() {
    let s = setup();
    s.remote.set_online(false);

    let outcome = s.orchestrator.perform_initial_sync(None).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.items_added, 0);
    assert!(!outcome.errors.is_empty());
}

#[test]
fn incremental_failure_is_reported_not_raised() {
    let s = setup();
    s.remote.put(CollectionTag::Games, "g1", json!({}));
    s.remote.fail_fetch(CollectionTag::Games, true);
    s.orchestrator.perform_initial_sync(None).unwrap();

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);

    s.remote.fail_fetch(CollectionTag::Games, false);
    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_added, 1);
}

#[test]
fn synopsis_failure_still_pushes() {
    let s = setup();
    s.orchestrator.perform_initial_sync(None).unwrap();
    s.store
        .put_local(CollectionTag::Schools, "s1", json!({"name": "Elm"}))
        .unwrap();
    s.remote.fail_synopsis(true);

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.items_pushed, 1);
    assert!(s.remote.document(CollectionTag::Schools, "s1").is_some());
}

#[test]
fn remote_deletions_purge_synced_records() {
    let s = setup();
    s.remote.put(CollectionTag::Promotions, "p1", json!({}));
    s.remote.put(CollectionTag::Promotions, "p2", json!({}));
    s.orchestrator.perform_initial_sync(None).unwrap();

    s.clock.advance(MINUTE);
    s.remote.remove(CollectionTag::Promotions, "p2");

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_deleted, 1);
    assert!(s.store.get(CollectionTag::Promotions, "p2").unwrap().is_none());
    assert!(s.store.get(CollectionTag::Promotions, "p1").unwrap().is_some());
}

#[test]
fn local_delete_is_pushed_then_purged() {
    let s = setup();
    s.remote.put(CollectionTag::Players, "p1", json!({"name": "Ada"}));
    s.orchestrator.perform_initial_sync(None).unwrap();

    s.store.soft_delete(CollectionTag::Players, "p1").unwrap();
    assert!(s.store.get_raw(CollectionTag::Players, "p1").unwrap().is_some());

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert!(s.remote.document(CollectionTag::Players, "p1").is_none());
    assert!(s.store.get_raw(CollectionTag::Players, "p1").unwrap().is_none());
    assert_eq!(s.remote.calls().deletes, 1);
}

#[test]
fn push_failures_retryable_and_fatal() {
    let s = setup();
    s.orchestrator.perform_initial_sync(None).unwrap();
    s.store
        .put_local(CollectionTag::Stories, "flaky", json!({}))
        .unwrap();
    s.store
        .put_local(CollectionTag::Stories, "invalid", json!({}))
        .unwrap();
    s.remote.reject_push("flaky", true);
    s.remote.reject_push("invalid", false);

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.items_pushed, 0);

    let flaky = s.store.get(CollectionTag::Stories, "flaky").unwrap().unwrap();
    assert_eq!(flaky.sync_status, SyncStatus::Pending);
    let invalid = s.store.get(CollectionTag::Stories, "invalid").unwrap().unwrap();
    assert_eq!(invalid.sync_status, SyncStatus::Error);

    s.remote.accept_push("flaky");
    s.remote.accept_push("invalid");
    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);

    assert_eq!(s.store.retry_failed(CollectionTag::Stories).unwrap(), 1);
    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert!(s.store.all_pending().unwrap().is_empty());
}

#[test]
fn user_scoped_collections_follow_the_user() {
    let s = setup();
    s.remote.put(
        CollectionTag::UserPreferences,
        "pref-u1",
        json!({"user_id": "u1", "theme": "dark"}),
    );
    s.remote.put(
        CollectionTag::UserPreferences,
        "pref-u2",
        json!({"user_id": "u2", "theme": "light"}),
    );

    s.orchestrator.perform_initial_sync(None).unwrap();
    assert!(s
        .store
        .get_all(CollectionTag::UserPreferences)
        .unwrap()
        .is_empty());

    s.orchestrator.perform_initial_sync(Some("u1")).unwrap();
    let prefs = s.store.get_all(CollectionTag::UserPreferences).unwrap();
    assert_eq!(prefs.len(), 1);
    assert_eq!(prefs[0].id, "pref-u1");
    assert_eq!(s.store.load_config().unwrap().user_id.as_deref(), Some("u1"));

    s.clock.advance(MINUTE);
    s.remote.put(
        CollectionTag::UserPreferences,
        "pref-u1",
        json!({"user_id": "u1", "theme": "solar"}),
    );
    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_updated, 1);
    let pref = s
        .store
        .get(CollectionTag::UserPreferences, "pref-u1")
        .unwrap()
        .unwrap();
    assert_eq!(pref.payload["theme"], "solar");
}

#[test]
fn user_scoped_initial_sync_leaves_nothing_to_do() {
    let s = setup();
    s.remote.put(
        CollectionTag::UserPreferences,
        "p1",
        json!({"user_id": "u1", "theme": "dark"}),
    );
    s.remote.put(
        CollectionTag::UserPreferences,
        "p2",
        json!({"user_id": "u2", "theme": "light"}),
    );

    s.orchestrator.perform_initial_sync(Some("u1")).unwrap();
    assert_eq!(
        s.store.get_all(CollectionTag::UserPreferences).unwrap().len(),
        1
    );
    assert!(!s.orchestrator.is_sync_needed());
}

#[derive(Debug, Serialize, Deserialize)]
struct Game {
    home: u32,
    away: u32,
}

impl Entity for Game {
    const COLLECTION: CollectionTag = CollectionTag::Games;
}

#[test]
fn typed_collections_reject_malformed_documents() {
    let s = setup_with(CollectionRegistry::standard().register_typed::<Game>());
    s.remote
        .put(CollectionTag::Games, "ok", json!({"home": 1, "away": 2}));
    s.remote
        .put(CollectionTag::Games, "bad", json!({"home": "lots"}));

    let outcome = s.orchestrator.perform_initial_sync(None).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_added, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("bad"));
    assert!(s.store.get(CollectionTag::Games, "bad").unwrap().is_none());
}

#[test]
fn unregistered_collections_are_not_fetched() {
    let registry = CollectionRegistry::new()
        .register(offcache_core::CollectionDescriptor::shared(CollectionTag::Teams));
    let s = setup_with(registry);
    s.remote.put(CollectionTag::Teams, "t", json!({}));
    s.remote.put(CollectionTag::Games, "g", json!({}));

    s.orchestrator.perform_initial_sync(None).unwrap();
    assert_eq!(s.remote.calls().fetches, 1);
    assert!(s.store.get(CollectionTag::Games, "g").unwrap().is_none());
}

#[test]
fn strategy_change_applies_to_later_runs() {
    let s = setup();
    s.remote.put(CollectionTag::Rewards, "r1", json!({"points": 1}));
    s.orchestrator.perform_initial_sync(None).unwrap();
    s.orchestrator
        .set_conflict_strategy(ConflictStrategy::ServerWins)
        .unwrap();

    s.clock.advance(MINUTE);
    s.remote.put(CollectionTag::Rewards, "r1", json!({"points": 2}));
    s.store
        .update_local(CollectionTag::Rewards, "r1", &json!({"points": 50}))
        .unwrap();

    let outcome = s.orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.conflicts[0].resolution, ConflictResolution::AcceptRemote);
    assert_eq!(outcome.unresolved_conflicts().count(), 0);
    let record = s.store.get(CollectionTag::Rewards, "r1").unwrap().unwrap();
    assert_eq!(record.payload, json!({"points": 2}));
}

/// A remote that parks the synopsis call until the test releases it.
struct GatedRemote {
    inner: InMemoryRemote,
    entered: Barrier,
    release: Barrier,
}

impl RemoteDataService for GatedRemote {
    fn fetch_collection(
        &self,
        tag: CollectionTag,
        user_id: Option<&str>,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        self.inner.fetch_collection(tag, user_id)
    }

    fn fetch_change_synopsis(
        &self,
        tags: &[CollectionTag],
    ) -> RemoteResult<HashMap<CollectionTag, CollectionSynopsis>> {
        self.entered.wait();
        self.release.wait();
        self.inner.fetch_change_synopsis(tags)
    }

    fn upsert(&self, tag: CollectionTag, id: &str, payload: &Document) -> RemoteResult<()> {
        self.inner.upsert(tag, id, payload)
    }

    fn delete(&self, tag: CollectionTag, id: &str) -> RemoteResult<()> {
        self.inner.delete(tag, id)
    }
}

#[test]
fn concurrent_sync_fails_fast() {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1)));
    let store = Arc::new(EntityStore::open(Arc::new(InMemoryStore::new()), clock.clone()).unwrap());
    let remote = GatedRemote {
        inner: InMemoryRemote::new(clock),
        entered: Barrier::new(2),
        release: Barrier::new(2),
    };
    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        remote,
        CollectionRegistry::standard(),
        OrchestratorConfig::default(),
    )
    .unwrap();

    std::thread::scope(|scope| {
        let running = scope.spawn(|| orchestrator.perform_incremental_sync());

        orchestrator.remote().entered.wait();
        assert!(orchestrator.is_running());
        assert!(store.load_config().unwrap().sync_in_progress);
        assert!(matches!(
            orchestrator.perform_incremental_sync(),
            Err(SyncError::AlreadyInProgress)
        ));
        assert!(matches!(
            orchestrator.perform_initial_sync(None),
            Err(SyncError::AlreadyInProgress)
        ));
        orchestrator.remote().release.wait();

        let outcome = running.join().unwrap().unwrap();
        assert!(outcome.success);
    });

    assert!(!orchestrator.is_running());
    assert!(!store.load_config().unwrap().sync_in_progress);
}

/// A remote where another client writes right after each upsert to Games.
struct BusyRemote {
    inner: InMemoryRemote,
    edit: (CollectionTag, &'static str, Document),
}

impl RemoteDataService for BusyRemote {
    fn fetch_collection(
        &self,
        tag: CollectionTag,
        user_id: Option<&str>,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        self.inner.fetch_collection(tag, user_id)
    }

    fn fetch_change_synopsis(
        &self,
        tags: &[CollectionTag],
    ) -> RemoteResult<HashMap<CollectionTag, CollectionSynopsis>> {
        self.inner.fetch_change_synopsis(tags)
    }

    fn upsert(&self, tag: CollectionTag, id: &str, payload: &Document) -> RemoteResult<()> {
        self.inner.upsert(tag, id, payload)?;
        if tag == CollectionTag::Games {
            let (other_tag, other_id, other_payload) = &self.edit;
            self.inner.put(*other_tag, other_id, other_payload.clone());
        }
        Ok(())
    }

    fn delete(&self, tag: CollectionTag, id: &str) -> RemoteResult<()> {
        self.inner.delete(tag, id)
    }
}

fn busy_setup(
    edit: (CollectionTag, &'static str, Document),
) -> (SyncOrchestrator<BusyRemote>, Arc<EntityStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
    let store = Arc::new(EntityStore::open(Arc::new(InMemoryStore::new()), clock.clone()).unwrap());
    let inner = InMemoryRemote::new(clock.clone());
    inner.put(CollectionTag::Teams, "t1", json!({"name": "original"}));
    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        BusyRemote { inner, edit },
        CollectionRegistry::standard(),
        OrchestratorConfig::default(),
    )
    .unwrap();
    (orchestrator, store, clock)
}

#[test]
fn edits_made_during_a_push_are_pulled_later() {
    let (orchestrator, store, clock) = busy_setup((
        CollectionTag::Teams,
        "t1",
        json!({"name": "edited-by-other-client"}),
    ));
    orchestrator.perform_initial_sync(None).unwrap();

    clock.advance(MINUTE);
    store
        .put_local(CollectionTag::Games, "g1", json!({"home": "t1"}))
        .unwrap();
    let outcome = orchestrator.perform_incremental_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert!(orchestrator.is_sync_needed());

    orchestrator.perform_incremental_sync().unwrap();
    orchestrator.perform_incremental_sync().unwrap();
    clock.advance(Duration::from_secs(2 * 60 * 60));
    orchestrator.perform_incremental_sync().unwrap();

    let team = store.get(CollectionTag::Teams, "t1").unwrap().unwrap();
    assert_eq!(team.payload, json!({"name": "edited-by-other-client"}));
    assert_eq!(team.sync_status, SyncStatus::Synced);
    assert!(!orchestrator.is_sync_needed());
}

#[test]
fn edits_to_the_pushed_collection_are_pulled_in_the_same_run() {
    let (orchestrator, store, clock) = busy_setup((
        CollectionTag::Games,
        "g2",
        json!({"home": "other-client"}),
    ));
    orchestrator.perform_initial_sync(None).unwrap();

    clock.advance(MINUTE);
    store
        .put_local(CollectionTag::Games, "g1", json!({"home": "t1"}))
        .unwrap();
    orchestrator.perform_incremental_sync().unwrap();

    let other = store.get(CollectionTag::Games, "g2").unwrap().unwrap();
    assert_eq!(other.payload, json!({"home": "other-client"}));
    assert!(!orchestrator.is_sync_needed());
}
