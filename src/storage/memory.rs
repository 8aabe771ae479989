use super::engine::{CommitRequest, StateSnapshot, StorageEngine, VersionedValue};
use super::persistence::{DurabilityMode, PersistenceManager, WalEntry, apply_changes};
use crate::core::{LedgerError, Result};
use async_trait::async_trait;
use im::OrdMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

struct MemoryState {
    version: u64,
    entries: OrdMap<String, VersionedValue>,
    persistence: Option<PersistenceManager>,
}

/// Versioned ordered key/value world state, optionally backed by a WAL.
pub struct InMemoryStorage {
    state: RwLock<MemoryState>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                version: 0,
                entries: OrdMap::new(),
                persistence: None,
            }),
        }
    }

    /// Open a durable world state in `data_dir`, recovering whatever the
    /// snapshot and WAL hold.
    pub fn open<P: AsRef<Path>>(
        data_dir: P,
        durability_mode: DurabilityMode,
        checkpoint_threshold: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let mut persistence = PersistenceManager::new(data_dir, durability_mode)?;
        persistence
            .wal_mut()
            .set_checkpoint_threshold(checkpoint_threshold);

        let recovered = persistence.recover()?;
        info!(
            data_dir = %data_dir.display(),
            durability = ?persistence.durability_mode(),
            version = recovered.version,
            entries = recovered.entries.len(),
            replayed = recovered.replayed,
            "world state recovered"
        );

        Ok(Self {
            state: RwLock::new(MemoryState {
                version: recovered.version,
                entries: recovered.entries,
                persistence: Some(persistence),
            }),
        })
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(entries: &OrdMap<String, VersionedValue>, request: &CommitRequest) -> Result<()> {
    for (key, observed) in &request.reads {
        let current = entries.get(key.as_str()).map(|v| v.version);
        if current != *observed {
            return Err(LedgerError::Conflict(format!(
                "key {} changed since txn_{} read it",
                key, request.tx_id
            )));
        }
    }

    for range in &request.ranges {
        let current: Vec<(String, u64)> = StateSnapshot::new(0, entries.clone())
            .range(&range.start, &range.end)
            .into_iter()
            .map(|(k, v)| (k, v.version))
            .collect();
        if current != range.observed {
            return Err(LedgerError::Conflict(format!(
                "range [{}, {}) changed since txn_{} scanned it",
                range.start, range.end, request.tx_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn snapshot(&self) -> Result<StateSnapshot> {
        let state = self.state.read().await;
        Ok(StateSnapshot::new(state.version, state.entries.clone()))
    }

    async fn commit(&self, request: CommitRequest) -> Result<u64> {
        let mut state = self.state.write().await;

        // Snapshot reads are already consistent; only writers need validation.
        if request.is_read_only() {
            return Ok(state.version);
        }
        validate(&state.entries, &request)?;

        let version = state.version + 1;
        let CommitRequest { changes, .. } = request;

        if let Some(persistence) = state.persistence.as_mut() {
            persistence.log(&WalEntry::Commit {
                version,
                changes: changes.clone(),
            })?;
        }

        apply_changes(&mut state.entries, version, changes);
        state.version = version;

        let MemoryState {
            entries,
            persistence,
            ..
        } = &mut *state;
        if let Some(persistence) = persistence {
            if persistence.needs_checkpoint() {
                // The WAL already holds this commit, so a failed checkpoint
                // loses nothing.
                if let Err(err) = persistence.checkpoint(version, entries) {
                    warn!(version, error = %err, "checkpoint failed");
                }
            }
        }

        Ok(version)
    }

    async fn entry_count(&self) -> Result<usize> {
        Ok(self.state.read().await.entries.len())
    }

    /// Write a snapshot and truncate the WAL now.
    async fn checkpoint(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let MemoryState {
            version,
            entries,
            persistence,
        } = &mut *state;
        match persistence {
            Some(persistence) => persistence.checkpoint(*version, entries),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::transaction::Change;
    use tempfile::TempDir;

    fn put_request(reads: Vec<(String, Option<u64>)>, key: &str, value: &str) -> CommitRequest {
        CommitRequest {
            tx_id: 1,
            reads,
            ranges: Vec::new(),
            changes: vec![Change::Put {
                key: key.to_string(),
                value: value.as_bytes().to_vec(),
            }],
        }
    }

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let storage = InMemoryStorage::new();
        let version = storage
            .commit(put_request(vec![], "asset/a1", "x"))
            .await
            .unwrap();
        assert_eq!(version, 1);

        let snapshot = storage.snapshot().await.unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.get("asset/a1").unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_commits() {
        let storage = InMemoryStorage::new();
        let before = storage.snapshot().await.unwrap();
        storage
            .commit(put_request(vec![], "asset/a1", "x"))
            .await
            .unwrap();
        assert!(before.get("asset/a1").is_none());
    }

    #[tokio::test]
    async fn test_stale_read_is_rejected_and_nothing_applied() {
        let storage = InMemoryStorage::new();
        storage
            .commit(put_request(vec![], "owner/o1", "1"))
            .await
            .unwrap();

        let stale = put_request(
            vec![("owner/o1".to_string(), None)],
            "asset/a1",
            "x",
        );
        let err = storage.commit(stale).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(storage.entry_count().await.unwrap(), 1);
        assert_eq!(storage.version().await, 1);
    }

    #[tokio::test]
    async fn test_reopen_recovers_commits() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = InMemoryStorage::open(temp_dir.path(), DurabilityMode::Sync, 1000).unwrap();
            storage
                .commit(put_request(vec![], "asset/a1", "x"))
                .await
                .unwrap();
            storage
                .commit(put_request(vec![], "owner/o1", "y"))
                .await
                .unwrap();
        }

        let reopened = InMemoryStorage::open(temp_dir.path(), DurabilityMode::Sync, 1000).unwrap();
        assert_eq!(reopened.version().await, 2);
        assert_eq!(reopened.entry_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_checkpoint_threshold_triggers_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = InMemoryStorage::open(temp_dir.path(), DurabilityMode::Sync, 2).unwrap();
            for i in 0..3 {
                storage
                    .commit(put_request(vec![], &format!("asset/a{}", i), "x"))
                    .await
                    .unwrap();
            }
        }
        assert!(temp_dir.path().join("carledger.snapshot").exists());

        let reopened = InMemoryStorage::open(temp_dir.path(), DurabilityMode::Sync, 2).unwrap();
        assert_eq!(reopened.version().await, 3);
        assert_eq!(reopened.entry_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_manual_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let storage = InMemoryStorage::open(temp_dir.path(), DurabilityMode::Sync, 1000).unwrap();
        storage
            .commit(put_request(vec![], "asset/a1", "x"))
            .await
            .unwrap();
        storage.checkpoint().await.unwrap();
        assert!(temp_dir.path().join("carledger.snapshot").exists());

        InMemoryStorage::new().checkpoint().await.unwrap();
    }
}
