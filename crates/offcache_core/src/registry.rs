//! The collection registry.
//!
//! Every collection the sync orchestrator walks is described here once, at
//! startup. A descriptor says whether the collection is shared or scoped to
//! the signed-in user, which payload field carries the record id, and
//! optionally how to validate documents coming from the server.

use crate::document::Document;
use crate::types::CollectionTag;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain type stored in exactly one collection.
///
/// # Example
///
/// ```rust
/// use offcache_core::{CollectionTag, Entity};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Reward {
///     id: String,
///     title: String,
///     points: u32,
/// }
///
/// impl Entity for Reward {
///     const COLLECTION: CollectionTag = CollectionTag::Rewards;
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned {
    /// The collection this type lives in.
    const COLLECTION: CollectionTag;
}

/// Whose data a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionScope {
    /// The same records for every user.
    Shared,
    /// Records fetched per user id.
    User,
}

/// Checks that a document has the shape a collection expects.
pub type DocumentValidator = fn(&Document) -> Result<(), String>;

/// Static description of one collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionDescriptor {
    /// The collection.
    pub tag: CollectionTag,
    /// Shared or per-user.
    pub scope: CollectionScope,
    /// Payload field holding the record id.
    pub id_field: &'static str,
    validator: Option<DocumentValidator>,
}

impl CollectionDescriptor {
    /// Describes a shared collection keyed by `"id"`.
    pub const fn shared(tag: CollectionTag) -> Self {
        Self {
            tag,
            scope: CollectionScope::Shared,
            id_field: "id",
            validator: None,
        }
    }

    /// Describes a per-user collection keyed by `"id"`.
    pub const fn user(tag: CollectionTag) -> Self {
        Self {
            tag,
            scope: CollectionScope::User,
            id_field: "id",
            validator: None,
        }
    }

    /// Uses a different payload field as the record id.
    #[must_use]
    pub const fn with_id_field(mut self, field: &'static str) -> Self {
        self.id_field = field;
        self
    }

    /// Validates documents against `T` before they are cached.
    #[must_use]
    pub fn with_model<T: DeserializeOwned>(mut self) -> Self {
        self.validator = Some(validate_as::<T>);
        self
    }

    /// Returns true for user-scoped collections.
    pub fn is_user_scoped(&self) -> bool {
        self.scope == CollectionScope::User
    }

    /// Checks a document coming from the server.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when a model is registered and
    /// the document does not deserialize into it.
    pub fn validate(&self, document: &Document) -> Result<(), String> {
        match self.validator {
            Some(validate) => validate(document),
            None => Ok(()),
        }
    }

    /// Reads the record id out of a payload.
    ///
    /// String ids are used as-is and integer ids are formatted.
    pub fn id_of(&self, document: &Document) -> Option<String> {
        match document.get(self.id_field)? {
            Document::String(id) if !id.is_empty() => Some(id.clone()),
            Document::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn validate_as<T: DeserializeOwned>(document: &Document) -> Result<(), String> {
    T::deserialize(document).map(|_| ()).map_err(|e| e.to_string())
}

/// The set of collections the cache syncs, in sync order.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    descriptors: Vec<CollectionDescriptor>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: every collection, with user preferences
    /// scoped per user.
    #[must_use]
    pub fn standard() -> Self {
        CollectionTag::ALL
            .into_iter()
            .fold(Self::new(), |registry, tag| {
                let descriptor = match tag {
                    CollectionTag::UserPreferences => CollectionDescriptor::user(tag),
                    _ => CollectionDescriptor::shared(tag),
                };
                registry.register(descriptor)
            })
    }

    /// Adds or replaces a descriptor.
    #[must_use]
    pub fn register(mut self, descriptor: CollectionDescriptor) -> Self {
        match self.descriptors.iter_mut().find(|d| d.tag == descriptor.tag) {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
        self
    }

    /// Attaches `T` as the model of its collection, registering the
    /// collection as shared if it is not registered yet.
    #[must_use]
    pub fn register_typed<T: Entity>(self) -> Self {
        let descriptor = self
            .get(T::COLLECTION)
            .copied()
            .unwrap_or_else(|| CollectionDescriptor::shared(T::COLLECTION))
            .with_model::<T>();
        self.register(descriptor)
    }

    /// Looks up a descriptor.
    pub fn get(&self, tag: CollectionTag) -> Option<&CollectionDescriptor> {
        self.descriptors.iter().find(|d| d.tag == tag)
    }

    /// Returns true if `tag` is registered.
    pub fn contains(&self, tag: CollectionTag) -> bool {
        self.get(tag).is_some()
    }

    /// Registered tags in registration order.
    pub fn tags(&self) -> Vec<CollectionTag> {
        self.descriptors.iter().map(|d| d.tag).collect()
    }

    /// Iterates over the descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.descriptors.iter()
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
