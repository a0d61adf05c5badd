//! Blob encoding.
//!
//! Every persisted value is CBOR wrapped in a small envelope carrying the
//! blob format, so a future layout change is detected instead of
//! misread.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current blob envelope format.
pub const BLOB_FORMAT: u16 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: u16,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    format: u16,
    body: T,
}

/// Encodes `value` into a blob.
///
/// # Errors
///
/// Returns [`StoreError::Encode`] if serialization fails.
pub fn encode_blob<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(
        &EnvelopeRef {
            format: BLOB_FORMAT,
            body: value,
        },
        &mut bytes,
    )
    .map_err(|e| StoreError::encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a blob read from `key`.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if the bytes are not a valid envelope or
/// carry an unknown format.
pub fn decode_blob<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> StoreResult<T> {
    let envelope: Envelope<T> =
        ciborium::de::from_reader(bytes).map_err(|e| StoreError::decode(key, e.to_string()))?;

    if envelope.format != BLOB_FORMAT {
        return Err(StoreError::decode(
            key,
            format!(
                "unsupported blob format {} (expected {})",
                envelope.format, BLOB_FORMAT
            ),
        ));
    }

    Ok(envelope.body)
}
