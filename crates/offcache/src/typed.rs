//! Typed access to one collection.

use crate::cache::OfflineCache;
use crate::error::CacheResult;
use offcache_core::{Document, Entity};
use offcache_sync::RemoteDataService;
use std::marker::PhantomData;

/// A view of the collection `T` lives in, with payloads converted to and
/// from `T`.
///
/// ```rust
/// use offcache::{CollectionTag, Entity, InMemoryRemote, OfflineCache, SystemClock};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Serialize, Deserialize)]
/// struct Reward {
///     id: String,
///     points: u32,
/// }
///
/// impl Entity for Reward {
///     const COLLECTION: CollectionTag = CollectionTag::Rewards;
/// }
///
/// let cache = OfflineCache::builder()
///     .build(InMemoryRemote::new(Arc::new(SystemClock)))
///     .unwrap();
/// let rewards = cache.collection::<Reward>();
/// rewards.create(&Reward { id: "r1".into(), points: 5 }).unwrap();
/// assert_eq!(rewards.find(|r| r.points > 1).len(), 1);
/// ```
pub struct TypedCollection<'a, T, R: RemoteDataService> {
    cache: &'a OfflineCache<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Entity, R: RemoteDataService> TypedCollection<'a, T, R> {
    pub(crate) fn new(cache: &'a OfflineCache<R>) -> Self {
        Self {
            cache,
            _marker: PhantomData,
        }
    }

    /// Every live record.
    pub fn all(&self) -> Vec<T> {
        self.cache.get_all(T::COLLECTION)
    }

    /// A live record by id.
    pub fn get(&self, id: &str) -> Option<T> {
        self.cache.get_by_id(T::COLLECTION, id)
    }

    /// Live records matching `predicate`.
    pub fn find<P: Fn(&T) -> bool>(&self, predicate: P) -> Vec<T> {
        self.cache.get_by_predicate(T::COLLECTION, predicate)
    }

    /// Stores `item` as a pending local change and returns its id.
    ///
    /// # Errors
    ///
    /// See [`OfflineCache::create`].
    pub fn create(&self, item: &T) -> CacheResult<String> {
        let payload = serde_json::to_value(item)?;
        self.cache.create(T::COLLECTION, payload)
    }

    /// Replaces the payload of an existing record with `item`.
    ///
    /// # Errors
    ///
    /// See [`OfflineCache::update`].
    pub fn update(&self, id: &str, item: &T) -> CacheResult<()> {
        let payload = serde_json::to_value(item)?;
        let current = self
            .cache
            .store()
            .get(T::COLLECTION, id)?
            .map(|record| record.payload);
        let patch = replace_with(current.as_ref(), payload);
        self.cache.update(T::COLLECTION, id, &patch)
    }

    /// Deletes a record locally.
    ///
    /// # Errors
    ///
    /// See [`OfflineCache::delete`].
    pub fn delete(&self, id: &str) -> CacheResult<()> {
        self.cache.delete(T::COLLECTION, id)
    }
}

// Fields of `current` missing from `payload` are nulled so the patch
// removes them.
fn replace_with(current: Option<&Document>, mut payload: Document) -> Document {
    if let (Some(Document::Object(old)), Document::Object(new)) = (current, &mut payload) {
        for key in old.keys() {
            if !new.contains_key(key) {
                new.insert(key.clone(), Document::Null);
            }
        }
    }
    payload
}
