use crate::core::Result;
use crate::transaction::Change;
use async_trait::async_trait;
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::ops::Bound;

/// Stored bytes plus the commit version that last wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub version: u64,
    pub bytes: Vec<u8>,
}

/// Immutable point-in-time view of the world state.
///
/// Cloning the underlying `OrdMap` is O(1), so taking a snapshot per
/// transaction is cheap and later commits never disturb it.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    version: u64,
    entries: OrdMap<String, VersionedValue>,
}

impl StateSnapshot {
    pub fn new(version: u64, entries: OrdMap<String, VersionedValue>) -> Self {
        Self { version, entries }
    }

    /// Commit version this snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&VersionedValue> {
        self.entries.get(key)
    }

    /// Entries with `start <= key < end`, in key order. An empty `end`
    /// leaves the range open at the top.
    pub fn range(&self, start: &str, end: &str) -> Vec<(String, VersionedValue)> {
        if !end.is_empty() && start >= end {
            return Vec::new();
        }
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end)
        };
        self.entries
            .range::<_, str>((Bound::Included(start), upper))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A range scan as a transaction observed it, checked again at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRead {
    pub start: String,
    pub end: String,
    pub observed: Vec<(String, u64)>,
}

/// Everything the engine needs to validate and apply one transaction.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub tx_id: u64,
    /// Keys read and the version seen (`None` when the key was absent).
    pub reads: Vec<(String, Option<u64>)>,
    pub ranges: Vec<RangeRead>,
    pub changes: Vec<Change>,
}

impl CommitRequest {
    pub fn is_read_only(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Storage engine trait - allows pluggable world state backends
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Take a consistent snapshot for a new transaction.
    async fn snapshot(&self) -> Result<StateSnapshot>;

    /// Validate the read set and apply the write set as one unit.
    ///
    /// Returns the commit version. On error nothing is applied.
    async fn commit(&self, request: CommitRequest) -> Result<u64>;

    /// Number of keys currently stored.
    async fn entry_count(&self) -> Result<usize>;

    /// Flush durable state so recovery does not need the log. Engines
    /// without persistence do nothing.
    async fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}
