//! CBOR helpers for the structured parts of the store.
//!
//! Record payloads stay opaque to the engine; these helpers are used
//! only where structure is required: the metadata record, field-path
//! index extraction, and migration shape rewrites.

use crate::error::{StoreError, StoreResult};
use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a serde value to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes CBOR bytes into a serde value.
pub fn from_cbor<T: DeserializeOwned>(data: &[u8]) -> StoreResult<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::codec(e.to_string()))
}

/// Decodes CBOR bytes into a dynamic [`Value`].
pub fn value_from_cbor(data: &[u8]) -> StoreResult<Value> {
    ciborium::from_reader(data).map_err(|e| StoreError::codec(e.to_string()))
}

/// Encodes a dynamic [`Value`] to CBOR bytes.
pub fn value_to_cbor(value: &Value) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Looks up a field in a CBOR map value by text key.
#[must_use]
pub fn map_field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Map(entries) => entries.iter().find_map(|(k, v)| match k {
            Value::Text(t) if t == key => Some(v),
            _ => None,
        }),
        _ => None,
    }
}

/// Replaces (or inserts) a field in a CBOR map value by text key.
///
/// Returns false if the value is not a map.
pub fn set_map_field(value: &mut Value, key: &str, new: Value) -> bool {
    match value {
        Value::Map(entries) => {
            for (k, v) in entries.iter_mut() {
                if matches!(k, Value::Text(t) if t == key) {
                    *v = new;
                    return true;
                }
            }
            entries.push((Value::Text(key.to_string()), new));
            true
        }
        _ => false,
    }
}
