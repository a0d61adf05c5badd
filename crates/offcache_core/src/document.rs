//! Opaque document payloads and the two ways they are combined.

use serde_json::{Map, Value};

/// A domain object as the cache sees it: any JSON-shaped value.
pub type Document = Value;

/// Applies `patch` to `target` as a JSON merge patch (RFC 7396).
///
/// Object fields are merged recursively, `null` removes a field, and any
/// non-object patch replaces the target outright.
pub fn merge_patch(target: &mut Document, patch: &Document) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(target_fields) = target {
        for (key, value) in patch_fields {
            if value.is_null() {
                target_fields.remove(key);
            } else {
                merge_patch(
                    target_fields.entry(key.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

/// Overlays the top-level fields of `local` on `server`.
///
/// This is the whole-record merge used by the `Merge` conflict strategy:
/// fields only the server has survive, fields the local copy has win.
/// When either side is not an object the local document wins.
pub fn overlay(server: &Document, local: &Document) -> Document {
    match (server, local) {
        (Value::Object(server_fields), Value::Object(local_fields)) => {
            let mut merged = server_fields.clone();
            for (key, value) in local_fields {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => local.clone(),
    }
}
