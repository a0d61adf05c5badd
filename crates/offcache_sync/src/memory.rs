//! An in-memory remote data service for tests and demos.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{CollectionSynopsis, RemoteDataService, RemoteDocument};
use offcache_core::{Clock, CollectionTag, Document, Timestamp};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Payload field used to scope documents to a user.
const USER_FIELD: &str = "user_id";

/// Number of calls each operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    /// `fetch_collection` calls.
    pub fetches: u64,
    /// `fetch_change_synopsis` calls.
    pub synopses: u64,
    /// `upsert` calls.
    pub upserts: u64,
    /// `delete` calls.
    pub deletes: u64,
}

#[derive(Debug, Default)]
struct RemoteCollection {
    documents: BTreeMap<String, RemoteDocument>,
    last_updated: Timestamp,
}

impl RemoteCollection {
    // Change stamps strictly increase, even for edits within one millisecond.
    fn next_stamp(&self, now: Timestamp) -> Timestamp {
        now.max(self.last_updated.saturating_add(Duration::from_millis(1)))
    }
}

#[derive(Debug)]
struct RemoteState {
    collections: BTreeMap<CollectionTag, RemoteCollection>,
    online: bool,
    failing_fetches: HashSet<CollectionTag>,
    failing_synopsis: bool,
    rejected_pushes: HashMap<String, bool>,
    calls: RemoteCalls,
}

/// A server that lives in memory.
///
/// Clones share the same state, so a test can keep one handle to play the
/// server side while the orchestrator owns another. Server-side edits bump
/// the document version and the collection's `last_updated` using the
/// shared clock.
///
/// Failures can be injected per collection (fetch), per id (push) or for
/// the whole service (offline).
#[derive(Debug, Clone)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRemote {
    /// Creates an empty, online remote.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState {
                collections: BTreeMap::new(),
                online: true,
                failing_fetches: HashSet::new(),
                failing_synopsis: false,
                rejected_pushes: HashMap::new(),
                calls: RemoteCalls::default(),
            })),
            clock,
        }
    }

    /// Writes a document as another client would. Returns the new version.
    pub fn put(&self, tag: CollectionTag, id: &str, payload: Document) -> u64 {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Self::write(&mut state, tag, id, payload, now)
    }

    /// Deletes a document as another client would.
    pub fn remove(&self, tag: CollectionTag, id: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Self::erase(&mut state, tag, id, now)
    }

    /// Returns the server copy of a document.
    pub fn document(&self, tag: CollectionTag, id: &str) -> Option<RemoteDocument> {
        self.state
            .lock()
            .collections
            .get(&tag)
            .and_then(|c| c.documents.get(id))
            .cloned()
    }

    /// Number of documents in a collection.
    pub fn len(&self, tag: CollectionTag) -> usize {
        self.state
            .lock()
            .collections
            .get(&tag)
            .map_or(0, |c| c.documents.len())
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self, tag: CollectionTag) -> bool {
        self.len(tag) == 0
    }

    /// Takes the whole service on or offline.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Makes fetches of one collection fail with a retryable error.
    pub fn fail_fetch(&self, tag: CollectionTag, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.failing_fetches.insert(tag);
        } else {
            state.failing_fetches.remove(&tag);
        }
    }

    /// Makes synopsis requests fail with a retryable error.
    pub fn fail_synopsis(&self, fail: bool) {
        self.state.lock().failing_synopsis = fail;
    }

    /// Makes pushes of `id` fail until [`InMemoryRemote::accept_push`].
    pub fn reject_push(&self, id: &str, retryable: bool) {
        self.state
            .lock()
            .rejected_pushes
            .insert(id.to_string(), retryable);
    }

    /// Lets pushes of `id` through again.
    pub fn accept_push(&self, id: &str) {
        self.state.lock().rejected_pushes.remove(id);
    }

    /// Calls received so far.
    pub fn calls(&self) -> RemoteCalls {
        self.state.lock().calls
    }

    fn write(
        state: &mut RemoteState,
        tag: CollectionTag,
        id: &str,
        payload: Document,
        now: Timestamp,
    ) -> u64 {
        let collection = state.collections.entry(tag).or_default();
        let stamp = collection.next_stamp(now);
        let version = collection
            .documents
            .get(id)
            .map_or(1, |existing| existing.version + 1);
        collection.documents.insert(
            id.to_string(),
            RemoteDocument {
                id: id.to_string(),
                version,
                last_modified: stamp,
                payload,
            },
        );
        collection.last_updated = stamp;
        version
    }

    fn erase(state: &mut RemoteState, tag: CollectionTag, id: &str, now: Timestamp) -> bool {
        let Some(collection) = state.collections.get_mut(&tag) else {
            return false;
        };
        let removed = collection.documents.remove(id).is_some();
        if removed {
            collection.last_updated = collection.next_stamp(now);
        }
        removed
    }

    fn check_online(state: &RemoteState) -> RemoteResult<()> {
        if state.online {
            Ok(())
        } else {
            Err(RemoteError::retryable("remote service unreachable"))
        }
    }

    fn check_push(state: &RemoteState, id: &str) -> RemoteResult<()> {
        Self::check_online(state)?;
        match state.rejected_pushes.get(id) {
            Some(true) => Err(RemoteError::retryable(format!("push of {id:?} timed out"))),
            Some(false) => Err(RemoteError::fatal(format!("push of {id:?} rejected"))),
            None => Ok(()),
        }
    }
}

impl RemoteDataService for InMemoryRemote {
    fn fetch_collection(
        &self,
        tag: CollectionTag,
        user_id: Option<&str>,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let mut state = self.state.lock();
        state.calls.fetches += 1;
        Self::check_online(&state)?;
        if state.failing_fetches.contains(&tag) {
            return Err(RemoteError::retryable(format!("fetch of {tag} failed")));
        }

        let Some(collection) = state.collections.get(&tag) else {
            return Ok(Vec::new());
        };
        Ok(collection
            .documents
            .values()
            .filter(|doc| match user_id {
                Some(user) => doc.payload.get(USER_FIELD).and_then(|v| v.as_str()) == Some(user),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn fetch_change_synopsis(
        &self,
        tags: &[CollectionTag],
    ) -> RemoteResult<HashMap<CollectionTag, CollectionSynopsis>> {
        let mut state = self.state.lock();
        state.calls.synopses += 1;
        Self::check_online(&state)?;
        if state.failing_synopsis {
            return Err(RemoteError::retryable("synopsis unavailable"));
        }

        Ok(tags
            .iter()
            .map(|tag| {
                let synopsis = state.collections.get(tag).map_or(
                    CollectionSynopsis {
                        last_updated: Timestamp::ZERO,
                        record_count: 0,
                    },
                    |c| CollectionSynopsis {
                        last_updated: c.last_updated,
                        record_count: c.documents.len() as u64,
                    },
                );
                (*tag, synopsis)
            })
            .collect())
    }

    fn upsert(&self, tag: CollectionTag, id: &str, payload: &Document) -> RemoteResult<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.calls.upserts += 1;
        Self::check_push(&state, id)?;
        Self::write(&mut state, tag, id, payload.clone(), now);
        Ok(())
    }

    fn delete(&self, tag: CollectionTag, id: &str) -> RemoteResult<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.calls.deletes += 1;
        Self::check_push(&state, id)?;
        Self::erase(&mut state, tag, id, now);
        Ok(())
    }
}
