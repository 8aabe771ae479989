//! Per-entity CRUD over a [`WorldState`] handle.
//!
//! Every [`Entity`] gets the same operations through the blanket
//! [`Repository`] impl, so `Asset::read(state, id)` and
//! `Owner::read(state, id)` share one code path.

use crate::codec::{self, Entity};
use crate::core::{LedgerError, Result};
use crate::transaction::WorldState;
use tracing::debug;

pub trait Repository: Entity {
    /// True iff a record is stored under this type's key for `id`.
    /// The bytes are not decoded. An empty id never exists.
    fn exists(state: &mut dyn WorldState, id: &str) -> Result<bool> {
        if id.is_empty() {
            return Ok(false);
        }
        let key = codec::state_key::<Self>(id)?;
        Ok(state.get_state(&key)?.is_some())
    }

    fn read(state: &mut dyn WorldState, id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(LedgerError::not_found(Self::KIND, id));
        }
        let key = codec::state_key::<Self>(id)?;
        match state.get_state(&key)? {
            Some(bytes) => codec::decode(&key, &bytes),
            None => Err(LedgerError::not_found(Self::KIND, id)),
        }
    }

    fn create(state: &mut dyn WorldState, entity: &Self) -> Result<()> {
        if Self::exists(state, entity.id())? {
            return Err(LedgerError::already_exists(Self::KIND, entity.id()));
        }
        Self::write(state, entity)
    }

    /// Replace the whole stored record.
    fn update(state: &mut dyn WorldState, entity: &Self) -> Result<()> {
        if !Self::exists(state, entity.id())? {
            return Err(LedgerError::not_found(Self::KIND, entity.id()));
        }
        Self::write(state, entity)
    }

    fn delete(state: &mut dyn WorldState, id: &str) -> Result<()> {
        if !Self::exists(state, id)? {
            return Err(LedgerError::not_found(Self::KIND, id));
        }
        let key = codec::state_key::<Self>(id)?;
        state.del_state(&key)
    }

    /// Unchecked write, for callers that already read the record in the
    /// same transaction.
    fn write(state: &mut dyn WorldState, entity: &Self) -> Result<()> {
        let key = codec::state_key::<Self>(entity.id())?;
        let bytes = codec::encode(entity)?;
        state.put_state(&key, bytes)
    }

    /// Every record of this type, in key order.
    ///
    /// Only this type's namespace is scanned. A record there that does not
    /// decode fails the scan instead of being returned as a default value.
    fn scan_all(state: &mut dyn WorldState) -> Result<Vec<Self>> {
        let (start, end) = codec::namespace_range::<Self>();
        let mut records = Vec::new();
        for (key, bytes) in state.get_state_by_range(&start, &end)? {
            if codec::id_from_key::<Self>(&key).is_none() {
                debug!(key = %key, "skipping key without record id");
                continue;
            }
            records.push(codec::decode(&key, &bytes)?);
        }
        debug!(kind = %Self::KIND, count = records.len(), "namespace scanned");
        Ok(records)
    }

    /// Records matching `predicate`, in key order.
    fn scan_where<F>(state: &mut dyn WorldState, predicate: F) -> Result<Vec<Self>>
    where
        F: Fn(&Self) -> bool,
    {
        Ok(Self::scan_all(state)?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }
}

impl<E: Entity> Repository for E {}
