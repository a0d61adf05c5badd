//! Property tests of local mutations through the facade.

use offcache::CollectionTag;
use offcache_core::merge_patch;
use offcache_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

// Applies `mutations` to a plain map the way the cache should see them.
fn model(mutations: &[Mutation]) -> BTreeMap<String, Value> {
    let mut live = BTreeMap::new();
    for mutation in mutations {
        match mutation {
            Mutation::Create { id, payload } => {
                let mut payload = payload.clone();
                merge_patch(&mut payload, &json!({"id": id}));
                live.insert(id.clone(), payload);
            }
            Mutation::Update { id, patch } => {
                if let Some(current) = live.get_mut(id) {
                    merge_patch(current, patch);
                }
            }
            Mutation::Delete { id } => {
                live.remove(id);
            }
        }
    }
    live
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn facade_matches_model(
        tag in shared_tag_strategy(),
        mutations in prop::collection::vec(mutation_strategy(), 1..30),
    ) {
        let fixture = Fixture::new();
        let cache = fixture.cache();

        for mutation in &mutations {
            match mutation {
                Mutation::Create { id, payload } => {
                    let mut payload = payload.clone();
                    merge_patch(&mut payload, &json!({"id": id}));
                    prop_assert_eq!(cache.create(tag, payload).unwrap(), id.clone());
                }
                Mutation::Update { id, patch } => {
                    let exists = cache.get_by_id::<Value>(tag, id).is_some();
                    prop_assert_eq!(cache.update(tag, id, patch).is_ok(), exists);
                }
                Mutation::Delete { id } => cache.delete(tag, id).unwrap(),
            }
        }

        let expected = model(&mutations);
        let actual: BTreeMap<String, Value> = cache
            .records(tag)
            .into_iter()
            .map(|record| (record.id, record.payload))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn sync_drains_every_mutation(
        tag in shared_tag_strategy(),
        mutations in prop::collection::vec(mutation_strategy(), 1..30),
    ) {
        let fixture = Fixture::new();
        let cache = fixture.cache();
        cache.initial_sync(None).unwrap();

        for mutation in &mutations {
            match mutation {
                Mutation::Create { id, payload } => {
                    let mut payload = payload.clone();
                    merge_patch(&mut payload, &json!({"id": id}));
                    cache.create(tag, payload).unwrap();
                }
                Mutation::Update { id, patch } => {
                    let _ = cache.update(tag, id, patch);
                }
                Mutation::Delete { id } => cache.delete(tag, id).unwrap(),
            }
        }

        let outcome = cache.trigger_sync().unwrap();
        prop_assert!(outcome.success);
        prop_assert_eq!(cache.pending_count(), 0);

        let expected = model(&mutations);
        prop_assert_eq!(fixture.remote.len(tag), expected.len());
        for (id, payload) in &expected {
            let document = fixture.remote.document(tag, id).unwrap();
            prop_assert_eq!(&document.payload, payload);
        }
    }
}

#[test]
fn delete_of_unknown_id_is_quiet() {
    let fixture = Fixture::new();
    let cache = fixture.cache();
    cache.delete(CollectionTag::Teams, "ghost").unwrap();
    assert_eq!(cache.pending_count(), 0);
}
