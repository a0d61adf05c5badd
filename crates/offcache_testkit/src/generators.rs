//! Property-based test generators using proptest.

use offcache_core::{CollectionTag, Document};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for any collection.
pub fn collection_tag_strategy() -> impl Strategy<Value = CollectionTag> {
    prop::sample::select(CollectionTag::ALL.to_vec())
}

/// Strategy for collections that are not scoped to a user.
pub fn shared_tag_strategy() -> impl Strategy<Value = CollectionTag> {
    prop::sample::select(
        CollectionTag::ALL
            .into_iter()
            .filter(|tag| *tag != CollectionTag::UserPreferences)
            .collect::<Vec<_>>(),
    )
}

/// Strategy for short record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,5}").expect("Invalid regex")
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for flat object payloads without an `"id"` field.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-z]{1,6}", scalar_strategy(), 0..6).prop_map(|fields| {
        Value::Object(
            fields
                .into_iter()
                .filter(|(key, _)| key != "id")
                .collect::<Map<_, _>>(),
        )
    })
}

/// Strategy for merge patches: scalars set fields, `null` removes them.
pub fn patch_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map(
        "[a-z]{1,6}",
        prop_oneof![1 => Just(Value::Null), 3 => scalar_strategy()],
        1..4,
    )
    .prop_map(|fields| {
        Value::Object(
            fields
                .into_iter()
                .filter(|(key, _)| key != "id")
                .collect::<Map<_, _>>(),
        )
    })
}

/// A local mutation applied through the cache facade.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Create or overwrite a record.
    Create {
        /// Target record.
        id: String,
        /// New payload, without the id field.
        payload: Document,
    },
    /// Patch a record.
    Update {
        /// Target record.
        id: String,
        /// Merge patch.
        patch: Document,
    },
    /// Delete a record.
    Delete {
        /// Target record.
        id: String,
    },
}

impl Mutation {
    /// The record the mutation targets.
    pub fn id(&self) -> &str {
        match self {
            Mutation::Create { id, .. } | Mutation::Update { id, .. } | Mutation::Delete { id } => {
                id
            }
        }
    }
}

/// Strategy for a mutation over a small id space, so that mutations collide.
pub fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    let id = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(String::from);
    prop_oneof![
        3 => (id.clone(), document_strategy())
            .prop_map(|(id, payload)| Mutation::Create { id, payload }),
        2 => (id.clone(), patch_strategy()).prop_map(|(id, patch)| Mutation::Update { id, patch }),
        1 => id.prop_map(|id| Mutation::Delete { id }),
    ]
}
