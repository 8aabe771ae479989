// ============================================================================
// Transaction State Management
// ============================================================================
//
// A transaction reads from the snapshot taken when it began and buffers its
// writes. Reads see the transaction's own pending writes. Nothing reaches
// the world state until the TransactionManager commits the write set.
//
// State transitions:
//   Active ──commit──> Committed
//     │
//     └──rollback──> Aborted
//
// ============================================================================

use super::Change;
use super::stub::{StateRange, WorldState};
use crate::core::{LedgerError, Result};
use crate::storage::{CommitRequest, RangeRead, StateSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// One logical ledger operation in flight.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    snapshot: StateSnapshot,
    /// First version observed per key read from the snapshot.
    reads: HashMap<String, Option<u64>>,
    ranges: Vec<RangeRead>,
    /// Pending writes, last one wins. `None` marks a delete.
    writes: BTreeMap<String, Option<Vec<u8>>>,
    start_time: Instant,
}

impl Transaction {
    pub fn new(id: TransactionId, snapshot: StateSnapshot) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            snapshot,
            reads: HashMap::new(),
            ranges: Vec::new(),
            writes: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Commit version of the snapshot this transaction reads from.
    pub fn read_version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Number of distinct keys written so far.
    pub fn change_count(&self) -> usize {
        self.writes.len()
    }

    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.state.is_active() {
            return Err(LedgerError::TransactionError(format!(
                "{} is {}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Seal the transaction and hand its read and write sets to the engine.
    pub(crate) fn prepare_commit(&mut self) -> Result<CommitRequest> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;

        let changes = std::mem::take(&mut self.writes)
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Change::Put { key, value },
                None => Change::Delete { key },
            })
            .collect();

        Ok(CommitRequest {
            tx_id: self.id.as_u64(),
            reads: std::mem::take(&mut self.reads).into_iter().collect(),
            ranges: std::mem::take(&mut self.ranges),
            changes,
        })
    }

    /// The engine refused the write set handed over by `prepare_commit`.
    pub(crate) fn mark_failed(&mut self) {
        self.state = TransactionState::Aborted;
    }

    pub(crate) fn abort(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.state = TransactionState::Aborted;
        self.writes.clear();
        self.reads.clear();
        self.ranges.clear();
        Ok(())
    }
}

impl WorldState for Transaction {
    fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_active()?;
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }

        let stored = self.snapshot.get(key);
        self.reads
            .entry(key.to_string())
            .or_insert_with(|| stored.map(|v| v.version));
        Ok(stored.map(|v| v.bytes.clone()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn del_state(&mut self, key: &str) -> Result<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_string(), None);
        Ok(())
    }

    fn get_state_by_range(&mut self, start: &str, end: &str) -> Result<StateRange> {
        self.ensure_active()?;
        let base = self.snapshot.range(start, end);
        self.ranges.push(RangeRead {
            start: start.to_string(),
            end: end.to_string(),
            observed: base.iter().map(|(k, v)| (k.clone(), v.version)).collect(),
        });

        let mut merged: BTreeMap<String, Vec<u8>> =
            base.into_iter().map(|(k, v)| (k, v.bytes)).collect();

        if end.is_empty() || start < end {
            let upper = if end.is_empty() {
                Bound::Unbounded
            } else {
                Bound::Excluded(end)
            };
            for (key, pending) in self.writes.range::<str, _>((Bound::Included(start), upper)) {
                match pending {
                    Some(value) => {
                        merged.insert(key.clone(), value.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }

        Ok(StateRange::new(merged.into_iter().collect()))
    }
}
