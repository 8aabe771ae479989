// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Transaction, TransactionId};
use crate::core::{ErrorKind, Result};
use crate::storage::StorageEngine;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Counters kept across the lifetime of a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    pub started: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub conflicts: u64,
}

pub struct TransactionManager {
    engine: Arc<dyn StorageEngine>,
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    conflicts: AtomicU64,
}

impl TransactionManager {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    pub async fn begin(&self) -> Result<Transaction> {
        let snapshot = self.engine.snapshot().await?;
        let transaction = Transaction::new(TransactionId::new(), snapshot);
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(
            txn = %transaction.id(),
            read_version = transaction.read_version(),
            "transaction started"
        );
        Ok(transaction)
    }

    /// Validate and apply everything the transaction wrote.
    ///
    /// Returns the commit version. On error the world state is untouched.
    pub async fn commit(&self, transaction: &mut Transaction) -> Result<u64> {
        let txn_id = transaction.id();
        let change_count = transaction.change_count();
        let request = transaction.prepare_commit()?;

        match self.engine.commit(request).await {
            Ok(version) => {
                self.committed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    txn = %txn_id,
                    version,
                    change_count,
                    elapsed = ?transaction.duration(),
                    "transaction committed"
                );
                Ok(version)
            }
            Err(err) => {
                transaction.mark_failed();
                if err.kind() == ErrorKind::Conflict {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    warn!(txn = %txn_id, error = %err, "transaction conflicted");
                }
                Err(err)
            }
        }
    }

    pub fn rollback(&self, transaction: &mut Transaction) -> Result<()> {
        transaction.abort()?;
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
        debug!(txn = %transaction.id(), "transaction rolled back");
        Ok(())
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}
