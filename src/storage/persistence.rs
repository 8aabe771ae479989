//! Write-Ahead Logging (WAL) and snapshot checkpoints for the world state

use super::engine::VersionedValue;
use crate::core::{LedgerError, Result};
use crate::transaction::Change;
use chrono::{DateTime, Utc};
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const WAL_FILE: &str = "carledger.wal";
const SNAPSHOT_FILE: &str = "carledger.snapshot";
const SNAPSHOT_FORMAT: u32 = 1;

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// One committed write set, applied atomically at `version`.
    Commit { version: u64, changes: Vec<Change> },
}

impl WalEntry {
    pub fn version(&self) -> u64 {
        match self {
            WalEntry::Commit { version, .. } => *version,
        }
    }
}

// ============================================================================
// Ledger Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub format: u32,
    /// Last commit version included in `entries`.
    pub version: u64,
    pub entries: OrdMap<String, VersionedValue>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub entry_count: usize,
}

impl LedgerSnapshot {
    pub fn new(version: u64, entries: OrdMap<String, VersionedValue>) -> Self {
        let entry_count = entries.len();
        Self {
            format: SNAPSHOT_FORMAT,
            version,
            entries,
            metadata: SnapshotMetadata {
                created_at: Utc::now(),
                entry_count,
            },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every commit record.
    Sync,
    /// Flush to the OS, let it decide when to hit disk.
    #[default]
    Async,
    /// Keep nothing on disk.
    None,
}

impl std::str::FromStr for DurabilityMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(DurabilityMode::Sync),
            "async" => Ok(DurabilityMode::Async),
            "none" => Ok(DurabilityMode::None),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown durability mode '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

/// File the WAL appends to.
pub(crate) trait WalFile: Write + Send + Sync {
    /// Current length in bytes.
    fn size(&self) -> io::Result<u64>;

    fn truncate(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl WalFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

fn open_append(wal_path: &Path) -> Result<Box<dyn WalFile>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(wal_path)
        .map_err(|e| LedgerError::Store(format!("Failed to open WAL file: {}", e)))?;
    Ok(Box::new(file))
}

pub struct WalManager {
    wal_path: PathBuf,
    /// `None` when durability is off, or after a failed append could not
    /// be rolled back. Appends then fail until the WAL is cleared.
    wal_file: Option<BufWriter<Box<dyn WalFile>>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Store(format!("Failed to create WAL directory: {}", e))
            })?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            Some(open_append(&wal_path)?)
        } else {
            None
        };
        Ok(Self::with_file(wal_path, durability_mode, wal_file))
    }

    pub(crate) fn with_file(
        wal_path: PathBuf,
        durability_mode: DurabilityMode,
        wal_file: Option<Box<dyn WalFile>>,
    ) -> Self {
        Self {
            wal_path,
            wal_file: wal_file.map(BufWriter::new),
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
        }
    }

    /// Append one record, or leave the file exactly as it was.
    ///
    /// A failed write is cut back to the record's start so neither its
    /// bytes nor anything still buffered reach a later append.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let serialized = rmp_serde::to_vec(entry)?;
        let len = u32::try_from(serialized.len())
            .map_err(|_| LedgerError::Store("WAL entry too large".to_string()))?;
        let mut record = Vec::with_capacity(4 + serialized.len());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&serialized);

        let mut writer = self.wal_file.take().ok_or_else(|| {
            LedgerError::Store("WAL unavailable after a failed write; reopen the ledger".to_string())
        })?;
        let start = match writer.get_ref().size() {
            Ok(start) => start,
            Err(e) => {
                self.wal_file = Some(writer);
                return Err(LedgerError::Store(format!("Failed to stat WAL: {}", e)));
            }
        };

        let sync = self.durability_mode == DurabilityMode::Sync;
        let written = writer
            .write_all(&record)
            .and_then(|_| writer.flush())
            .and_then(|_| if sync { writer.get_mut().sync() } else { Ok(()) });

        match written {
            Ok(()) => {
                self.wal_file = Some(writer);
                self.entries_since_checkpoint += 1;
                Ok(())
            }
            Err(e) => {
                // into_parts drops the unflushed buffer instead of writing it.
                let (mut file, _) = writer.into_parts();
                match file.truncate(start) {
                    Ok(()) => self.wal_file = Some(BufWriter::new(file)),
                    Err(truncate_err) => warn!(
                        path = %self.wal_path.display(),
                        error = %truncate_err,
                        "WAL could not be rolled back, refusing further appends"
                    ),
                }
                Err(LedgerError::Store(format!("Failed to write WAL: {}", e)))
            }
        }
    }

    /// Read every complete record. A torn record at the tail, left by a
    /// crash mid-append, ends the log and is cut off so later appends
    /// follow the last complete record.
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        if !self.wal_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.wal_path)
            .map_err(|e| LedgerError::Store(format!("Failed to open WAL for reading: {}", e)))?;
        let file_len = file
            .metadata()
            .map_err(|e| LedgerError::Store(format!("Failed to stat WAL: {}", e)))?
            .len();
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut valid_len: u64 = 0;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(LedgerError::Store(format!(
                        "Failed to read WAL entry length: {}",
                        e
                    )));
                }
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            if valid_len + 4 + len as u64 > file_len {
                break;
            }
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(LedgerError::Store(format!(
                        "Failed to read WAL entry data: {}",
                        e
                    )));
                }
            }
            let entry: WalEntry = rmp_serde::from_slice(&data)?;
            entries.push(entry);
            valid_len += 4 + len as u64;
        }

        if valid_len < file_len {
            warn!(
                path = %self.wal_path.display(),
                valid_len,
                "ignoring torn WAL record at tail"
            );
            OpenOptions::new()
                .write(true)
                .open(&self.wal_path)
                .and_then(|file| file.set_len(valid_len))
                .map_err(|e| LedgerError::Store(format!("Failed to truncate WAL: {}", e)))?;
        }
        Ok(entries)
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let mut file = open_append(&self.wal_path)?;
        file.truncate(0)
            .map_err(|e| LedgerError::Store(format!("Failed to truncate WAL: {}", e)))?;
        self.wal_file = Some(BufWriter::new(file));
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Write to a temp file in the same directory, then rename over the
    /// old snapshot so readers never see a half-written file.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let dir = self
            .snapshot_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).map_err(|e| {
            LedgerError::Store(format!("Failed to create snapshot directory: {}", e))
        })?;

        let serialized = rmp_serde::to_vec(snapshot)?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| LedgerError::Store(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&serialized)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| LedgerError::Store(format!("Failed to write snapshot: {}", e)))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| LedgerError::Store(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.snapshot_path)
            .map_err(|e| LedgerError::Store(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: LedgerSnapshot = rmp_serde::from_slice(&data)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(LedgerError::Serialization(format!(
                "unsupported snapshot format {}",
                snapshot.format
            )));
        }
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

/// State rebuilt from disk.
#[derive(Debug, Default)]
pub struct RecoveredState {
    pub version: u64,
    pub entries: OrdMap<String, VersionedValue>,
    pub replayed: usize,
}

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> Result<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, version: u64, entries: &OrdMap<String, VersionedValue>) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.snapshot
            .save(&LedgerSnapshot::new(version, entries.clone()))?;
        self.wal.clear()?;
        info!(version, entry_count = entries.len(), "checkpoint written");
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Load the last snapshot and replay newer WAL records on top of it.
    pub fn recover(&self) -> Result<RecoveredState> {
        let mut state = match self.snapshot.load()? {
            Some(snapshot) => RecoveredState {
                version: snapshot.version,
                entries: snapshot.entries,
                replayed: 0,
            },
            None => RecoveredState::default(),
        };

        for entry in self.wal.read_all()? {
            let WalEntry::Commit { version, changes } = entry;
            if version <= state.version {
                continue;
            }
            apply_changes(&mut state.entries, version, changes);
            state.version = version;
            state.replayed += 1;
        }

        Ok(state)
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

/// Apply a committed write set to `entries`, stamping puts with `version`.
pub(crate) fn apply_changes(
    entries: &mut OrdMap<String, VersionedValue>,
    version: u64,
    changes: Vec<Change>,
) {
    for change in changes {
        match change {
            Change::Put { key, value } => {
                entries.insert(
                    key,
                    VersionedValue {
                        version,
                        bytes: value,
                    },
                );
            }
            Change::Delete { key } => {
                entries.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn put(key: &str, value: &str) -> Change {
        Change::Put {
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_wal_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let mut wal = WalManager::new(&wal_path, DurabilityMode::Sync).unwrap();
        wal.append(&WalEntry::Commit {
            version: 1,
            changes: vec![put("asset/a1", "x")],
        })
        .unwrap();
        wal.append(&WalEntry::Commit {
            version: 2,
            changes: vec![Change::Delete {
                key: "asset/a1".to_string(),
            }],
        })
        .unwrap();
        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].version(), 2);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let mut wal = WalManager::new(&wal_path, DurabilityMode::Sync).unwrap();
        wal.append(&WalEntry::Commit {
            version: 1,
            changes: vec![put("owner/o1", "x")],
        })
        .unwrap();
        drop(wal);

        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&64u32.to_le_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let mut wal = WalManager::new(&wal_path, DurabilityMode::Sync).unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 1);

        wal.append(&WalEntry::Commit {
            version: 2,
            changes: vec![put("owner/o2", "y")],
        })
        .unwrap();
        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].version(), 2);
    }

    /// Real WAL file that, while `failing` is set, writes half of each
    /// buffer and then errors, like a disk filling up mid-record.
    struct FailingFile {
        inner: File,
        failing: Arc<AtomicBool>,
        truncate_fails: bool,
    }

    impl Write for FailingFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.failing.load(Ordering::SeqCst) {
                self.inner.write_all(&buf[..buf.len() / 2])?;
                return Err(io::Error::other("no space left on device"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl WalFile for FailingFile {
        fn size(&self) -> io::Result<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if self.truncate_fails {
                return Err(io::Error::other("read-only file system"));
            }
            self.inner.truncate(len)
        }

        fn sync(&mut self) -> io::Result<()> {
            self.inner.sync()
        }
    }

    fn failing_wal(wal_path: &Path, truncate_fails: bool) -> (WalManager, Arc<AtomicBool>) {
        let failing = Arc::new(AtomicBool::new(false));
        let inner = OpenOptions::new()
            .create(true)
            .append(true)
            .open(wal_path)
            .unwrap();
        let file = FailingFile {
            inner,
            failing: failing.clone(),
            truncate_fails,
        };
        let wal = WalManager::with_file(
            wal_path.to_path_buf(),
            DurabilityMode::Sync,
            Some(Box::new(file)),
        );
        (wal, failing)
    }

    fn commit(version: u64, key: &str) -> WalEntry {
        WalEntry::Commit {
            version,
            changes: vec![put(key, "x")],
        }
    }

    #[test]
    fn test_failed_append_leaves_no_trace() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let (mut wal, failing) = failing_wal(&wal_path, false);

        wal.append(&commit(1, "asset/a1")).unwrap();
        let len_before = fs::metadata(&wal_path).unwrap().len();

        failing.store(true, Ordering::SeqCst);
        let err = wal.append(&commit(2, "asset/lost")).unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
        assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
        assert_eq!(wal.entries_since_checkpoint(), 1);

        // The retried commit reuses the version of the failed one.
        failing.store(false, Ordering::SeqCst);
        wal.append(&commit(2, "asset/kept")).unwrap();

        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        let WalEntry::Commit { version, changes } = &entries[1];
        assert_eq!(*version, 2);
        assert!(matches!(&changes[0], Change::Put { key, .. } if key == "asset/kept"));
    }

    #[test]
    fn test_unrecoverable_append_refuses_further_writes() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let (mut wal, failing) = failing_wal(&wal_path, true);

        wal.append(&commit(1, "asset/a1")).unwrap();
        failing.store(true, Ordering::SeqCst);
        assert!(wal.append(&commit(2, "asset/a2")).is_err());

        failing.store(false, Ordering::SeqCst);
        let err = wal.append(&commit(2, "asset/a2")).unwrap_err();
        assert!(err.to_string().contains("WAL unavailable"));

        // Recovery still sees only the committed record.
        assert_eq!(wal.read_all().unwrap().len(), 1);

        // A checkpoint reopens the file.
        wal.clear().unwrap();
        wal.append(&commit(3, "asset/a3")).unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot_mgr = SnapshotManager::new(temp_dir.path().join("test.snapshot"));
        let mut entries = OrdMap::new();
        apply_changes(&mut entries, 4, vec![put("asset/a1", "x")]);
        snapshot_mgr.save(&LedgerSnapshot::new(4, entries)).unwrap();
        assert!(snapshot_mgr.exists());

        let loaded = snapshot_mgr.load().unwrap().unwrap();
        assert_eq!(loaded.version, 4);
        assert_eq!(loaded.metadata.entry_count, 1);
        assert_eq!(loaded.entries.get("asset/a1").unwrap().version, 4);
    }

    #[test]
    fn test_checkpoint_clears_wal() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence =
            PersistenceManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();
        persistence
            .log(&WalEntry::Commit {
                version: 1,
                changes: vec![put("asset/a1", "x")],
            })
            .unwrap();
        assert_eq!(persistence.wal().entries_since_checkpoint(), 1);

        let mut entries = OrdMap::new();
        apply_changes(&mut entries, 1, vec![put("asset/a1", "x")]);
        persistence.checkpoint(1, &entries).unwrap();
        assert_eq!(persistence.wal().entries_since_checkpoint(), 0);
        assert!(persistence.wal().read_all().unwrap().is_empty());
    }

    #[test]
    fn test_recovery_replays_only_newer_records() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence =
            PersistenceManager::new(temp_dir.path(), DurabilityMode::Sync).unwrap();

        let mut entries = OrdMap::new();
        apply_changes(&mut entries, 1, vec![put("asset/a1", "v1")]);
        persistence.checkpoint(1, &entries).unwrap();

        persistence
            .log(&WalEntry::Commit {
                version: 2,
                changes: vec![put("asset/a1", "v2"), put("owner/o1", "o")],
            })
            .unwrap();
        persistence
            .log(&WalEntry::Commit {
                version: 3,
                changes: vec![Change::Delete {
                    key: "owner/o1".to_string(),
                }],
            })
            .unwrap();

        let recovered = persistence.recover().unwrap();
        assert_eq!(recovered.version, 3);
        assert_eq!(recovered.replayed, 2);
        assert_eq!(recovered.entries.get("asset/a1").unwrap().bytes, b"v2".to_vec());
        assert!(recovered.entries.get("owner/o1").is_none());
    }

    #[test]
    fn test_durability_mode_from_str() {
        assert_eq!("SYNC".parse::<DurabilityMode>().unwrap(), DurabilityMode::Sync);
        assert_eq!("none".parse::<DurabilityMode>().unwrap(), DurabilityMode::None);
        assert!("sometimes".parse::<DurabilityMode>().is_err());
    }
}
