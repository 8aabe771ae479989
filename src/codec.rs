//! Entity codec and keyspace layout.
//!
//! Every record type owns a key prefix (`asset/`, `owner/`), so a range
//! scan for one type never meets bytes of another. Values are JSON with
//! the field layout fixed by the model types.

use crate::core::{Asset, LedgerError, Owner, RecordKind, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record type that can be stored in the world state.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;
    /// Key prefix, including the trailing separator.
    const NAMESPACE: &'static str;

    fn id(&self) -> &str;
}

impl Entity for Asset {
    const KIND: RecordKind = RecordKind::Asset;
    const NAMESPACE: &'static str = "asset/";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Owner {
    const KIND: RecordKind = RecordKind::Owner;
    const NAMESPACE: &'static str = "owner/";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Store key for the record `id` of type `E`.
pub fn state_key<E: Entity>(id: &str) -> Result<String> {
    if id.is_empty() {
        return Err(LedgerError::InvalidArgument(format!(
            "{} id must not be empty",
            E::KIND
        )));
    }
    Ok(format!("{}{}", E::NAMESPACE, id))
}

/// Half-open key range `[start, end)` covering every record of type `E`.
pub fn namespace_range<E: Entity>() -> (String, String) {
    (E::NAMESPACE.to_string(), prefix_end(E::NAMESPACE))
}

/// Smallest key that sorts after every key starting with `prefix`.
fn prefix_end(prefix: &str) -> String {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(last) = bytes.pop() {
        if last < u8::MAX {
            bytes.push(last + 1);
            // Namespaces are ASCII, so bumping the last byte stays valid UTF-8.
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    String::new()
}

/// Record id encoded in `key`, if the key belongs to `E`'s namespace.
pub fn id_from_key<E: Entity>(key: &str) -> Option<&str> {
    key.strip_prefix(E::NAMESPACE).filter(|id| !id.is_empty())
}

pub fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>> {
    serde_json::to_vec(entity).map_err(|e| {
        LedgerError::Serialization(format!(
            "failed to encode {} {}: {}",
            E::KIND,
            entity.id(),
            e
        ))
    })
}

/// Decode bytes stored under `key` as `E`.
///
/// A record whose embedded id disagrees with its key is rejected: it was
/// written by something other than this codec.
pub fn decode<E: Entity>(key: &str, bytes: &[u8]) -> Result<E> {
    let entity: E = serde_json::from_slice(bytes).map_err(|e| {
        LedgerError::Serialization(format!("failed to decode {} at {}: {}", E::KIND, key, e))
    })?;

    match id_from_key::<E>(key) {
        Some(id) if id == entity.id() => Ok(entity),
        _ => Err(LedgerError::Serialization(format!(
            "{} record at {} carries id '{}'",
            E::KIND,
            key,
            entity.id()
        ))),
    }
}
