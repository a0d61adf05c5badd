//! End-to-end tests of the cache facade against an in-memory remote.

use offcache::{
    CacheError, CollectionRegistry, CollectionTag, ConflictResolution, ConflictStrategy, Document,
    Entity, InMemoryRemote, OfflineCache, OrchestratorConfig, RemoteDataService, StoreError,
    SyncStatus, LOCAL_ID_PREFIX,
};
use offcache_core::CollectionDescriptor;
use offcache_sync::{CollectionSynopsis, RemoteDocument, RemoteResult};
use offcache_testkit::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Game {
    id: String,
    home: String,
    away: String,
    #[serde(default)]
    score: Option<String>,
}

impl Entity for Game {
    const COLLECTION: CollectionTag = CollectionTag::Games;
}

#[test]
fn reads_are_served_offline() {
    let fixture = Fixture::new();
    fixture
        .remote
        .put(CollectionTag::Teams, "t1", json!({"id": "t1", "name": "Owls"}));
    let cache = fixture.cache();
    cache.initial_sync(None).unwrap();

    fixture.remote.set_online(false);
    let name: Vec<String> = cache
        .get_all::<Value>(CollectionTag::Teams)
        .into_iter()
        .filter_map(|team| team["name"].as_str().map(String::from))
        .collect();
    assert_eq!(name, vec!["Owls".to_string()]);
    assert_eq!(fixture.remote.calls().fetches, CollectionTag::ALL.len() as u64 - 1);
}

#[test]
fn offline_create_then_sync_pushes() {
    let fixture = Fixture::new();
    let cache = fixture.cache();
    cache.initial_sync(None).unwrap();

    fixture.remote.set_online(false);
    let id = cache
        .create(CollectionTag::Stories, json!({"title": "Rain delay"}))
        .unwrap();
    assert!(id.starts_with(LOCAL_ID_PREFIX));
    assert_eq!(cache.pending_count(), 1);

    let outcome = cache.trigger_sync().unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.items_pushed, 0);
    assert_eq!(cache.pending_count(), 1);

    fixture.remote.set_online(true);
    let outcome = cache.trigger_sync().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_pushed, 1);
    assert_eq!(cache.pending_count(), 0);
    assert_eq!(
        fixture.remote.document(CollectionTag::Stories, &id).unwrap().payload["title"],
        "Rain delay"
    );
}

#[test]
fn update_of_missing_record_fails() {
    let fixture = Fixture::new();
    let cache = fixture.cache();

    let err = cache
        .update(CollectionTag::Games, "nope", &json!({"score": "1-0"}))
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::RecordNotFound { .. })
    ));
}

#[test]
fn typed_model_rejects_bad_payloads() {
    let fixture = Fixture::new();
    let registry = CollectionRegistry::standard().register_typed::<Game>();
    let cache = fixture.cache_with(registry, OrchestratorConfig::default());

    let err = cache
        .create(CollectionTag::Games, json!({"id": "g1", "home": "Owls"}))
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::InvalidPayload { .. })
    ));

    let games = cache.collection::<Game>();
    games
        .create(&Game {
            id: "g1".into(),
            home: "Owls".into(),
            away: "Hawks".into(),
            score: None,
        })
        .unwrap();

    let err = cache
        .update(CollectionTag::Games, "g1", &json!({"away": null}))
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::InvalidPayload { .. })
    ));
    assert_eq!(games.get("g1").unwrap().away, "Hawks");
}

#[test]
fn custom_id_field() {
    let fixture = Fixture::new();
    let registry = CollectionRegistry::standard()
        .register(CollectionDescriptor::shared(CollectionTag::Coaches).with_id_field("coach_id"));
    let cache = fixture.cache_with(registry, OrchestratorConfig::default());

    let id = cache
        .create(CollectionTag::Coaches, json!({"coach_id": 17, "name": "Kim"}))
        .unwrap();
    assert_eq!(id, "17");

    let generated = cache
        .create(CollectionTag::Coaches, json!({"name": "Lee"}))
        .unwrap();
    let stored: Value = cache.get_by_id(CollectionTag::Coaches, &generated).unwrap();
    assert_eq!(stored["coach_id"], Value::String(generated));
}

#[test]
fn conflict_flow_through_facade() {
    let fixture = Fixture::new();
    let config = OrchestratorConfig::default().with_default_strategy(ConflictStrategy::Manual);
    let cache = fixture.cache_with(CollectionRegistry::standard(), config);

    fixture
        .remote
        .put(CollectionTag::Games, "g1", json!({"id": "g1", "score": "0-0"}));
    cache.initial_sync(None).unwrap();

    cache
        .update(CollectionTag::Games, "g1", &json!({"score": "1-0"}))
        .unwrap();
    fixture.advance(Duration::from_secs(5));
    fixture
        .remote
        .put(CollectionTag::Games, "g1", json!({"id": "g1", "score": "0-1"}));

    let outcome = cache.trigger_sync().unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.unresolved_conflicts().count(), 1);

    let parked = cache.conflicts(CollectionTag::Games).unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].conflict_payload.as_ref().unwrap()["score"], "0-1");
    assert_eq!(cache.all_conflicts().unwrap().len(), 1);

    let resolved = cache
        .resolve_conflict(CollectionTag::Games, "g1", ConflictResolution::KeepLocal)
        .unwrap();
    assert_eq!(resolved.sync_status, SyncStatus::Pending);

    let outcome = cache.trigger_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert_eq!(
        fixture.remote.document(CollectionTag::Games, "g1").unwrap().payload["score"],
        "1-0"
    );
}

#[test]
fn rejected_push_can_be_retried() {
    let fixture = Fixture::new();
    let cache = fixture.cache();
    cache.initial_sync(None).unwrap();

    cache
        .create(CollectionTag::Rewards, json!({"id": "r1", "points": 3}))
        .unwrap();
    fixture.remote.reject_push("r1", false);
    let outcome = cache.trigger_sync().unwrap();
    assert!(!outcome.success);
    assert_eq!(cache.get_storage_stats().unwrap().error_count, 1);

    fixture.remote.accept_push("r1");
    assert_eq!(cache.retry_failed(CollectionTag::Rewards).unwrap(), 1);
    let outcome = cache.trigger_sync().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items_pushed, 1);
}

#[test]
fn storage_stats_reflect_contents() {
    let fixture = Fixture::new();
    let cache = fixture.cache();

    let empty = cache.get_storage_stats().unwrap();
    assert_eq!(empty.total_entities, 0);
    assert!(empty.last_sync.is_none());

    cache
        .create(CollectionTag::Teams, json!({"id": "t1"}))
        .unwrap();
    cache
        .create(CollectionTag::Teams, json!({"id": "t2"}))
        .unwrap();
    let stats = cache.get_storage_stats().unwrap();
    assert_eq!(stats.total_entities, 2);
    assert_eq!(stats.pending_sync_count, 2);
    assert!(stats.cache_size_estimate > 0);

    cache.initial_sync(None).unwrap();
    let stats = cache.get_storage_stats().unwrap();
    assert_eq!(stats.pending_sync_count, 0);
    assert!(stats.last_sync.is_some());
}

#[test]
fn clear_all_data_starts_over() {
    let fixture = Fixture::new();
    let config = OrchestratorConfig::default().with_default_strategy(ConflictStrategy::ClientWins);
    let cache = fixture.cache_with(CollectionRegistry::standard(), config);

    fixture
        .remote
        .put(CollectionTag::Teams, "t1", json!({"id": "t1"}));
    cache.initial_sync(Some("u1")).unwrap();
    cache
        .orchestrator()
        .set_conflict_strategy(ConflictStrategy::ServerWins)
        .unwrap();

    cache.clear_all_data().unwrap();
    assert!(cache.records(CollectionTag::Teams).is_empty());
    assert!(cache.is_sync_needed());

    let config = cache.store().load_config().unwrap();
    assert!(config.never_synced());
    assert_eq!(config.user_id, None);
    assert_eq!(
        config.conflict_resolution_strategy,
        ConflictStrategy::ClientWins
    );
}

#[test]
fn corrupted_collection_is_served_empty() {
    let fixture = Fixture::new();
    let cache = fixture.cache();
    cache
        .create(CollectionTag::Teams, json!({"id": "t1"}))
        .unwrap();

    fixture.corrupt(CollectionTag::Teams);
    assert!(cache.records(CollectionTag::Teams).is_empty());
    assert!(cache.get_by_id::<Value>(CollectionTag::Teams, "t1").is_none());
    assert!(cache
        .create(CollectionTag::Teams, json!({"id": "t2"}))
        .is_err());
}

#[test]
fn file_cache_survives_restart() {
    let fixture = FileFixture::new();
    let id = {
        let cache = fixture.open();
        cache
            .create(CollectionTag::Fields, json!({"name": "North"}))
            .unwrap()
    };

    let cache = fixture.open();
    assert_eq!(cache.pending_count(), 1);
    let outcome = cache.trigger_sync().unwrap();
    assert_eq!(outcome.items_pushed, 1);
    assert!(fixture.remote.document(CollectionTag::Fields, &id).is_some());
}

#[test]
fn interrupted_sync_is_detected_after_restart() {
    let fixture = Fixture::new();
    {
        let store = fixture.store();
        store
            .update_config(|config| config.sync_in_progress = true)
            .unwrap();
    }

    let cache = fixture.cache();
    assert!(cache.orchestrator().was_interrupted());
    assert!(!cache.store().load_config().unwrap().sync_in_progress);
}

/// A remote that parks its first synopsis call until the test releases it.
struct GatedRemote {
    inner: InMemoryRemote,
    gated: AtomicBool,
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
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
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
fn clear_all_data_refuses_during_a_sync() {
    let fixture = Fixture::new();
    let cache = OfflineCache::builder()
        .kv(fixture.kv.clone())
        .clock(fixture.clock.clone())
        .build(GatedRemote {
            inner: fixture.remote.clone(),
            gated: AtomicBool::new(true),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        })
        .unwrap();
    cache
        .create(CollectionTag::Teams, json!({"id": "t1", "name": "Owls"}))
        .unwrap();

    std::thread::scope(|scope| {
        let running = scope.spawn(|| cache.orchestrator().perform_incremental_sync());

        cache.orchestrator().remote().entered.wait();
        let err = cache.clear_all_data().unwrap_err();
        assert!(err.is_sync_in_progress());
        cache.orchestrator().remote().release.wait();

        let outcome = running.join().unwrap().unwrap();
        assert_eq!(outcome.items_pushed, 1);
    });

    // The refused wipe left the synced record alone.
    let team: Value = cache.get_by_id(CollectionTag::Teams, "t1").unwrap();
    assert_eq!(team["name"], "Owls");
    assert!(fixture.remote.document(CollectionTag::Teams, "t1").is_some());

    cache.clear_all_data().unwrap();
    assert!(cache.records(CollectionTag::Teams).is_empty());
}

#[test]
fn sync_refuses_inside_an_exclusive_section() {
    let fixture = Fixture::new();
    let cache = fixture.cache();
    cache
        .create(CollectionTag::Teams, json!({"id": "t1"}))
        .unwrap();

    let err = cache
        .orchestrator()
        .exclusive(|_| Ok(cache.initial_sync(None)))
        .unwrap()
        .unwrap_err();
    assert!(err.is_sync_in_progress());
    assert_eq!(fixture.remote.len(CollectionTag::Teams), 0);
    assert_eq!(cache.pending_count(), 1);
}
