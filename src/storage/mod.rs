pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::{CommitRequest, RangeRead, StateSnapshot, StorageEngine, VersionedValue};
pub use memory::InMemoryStorage;
pub use persistence::{DurabilityMode, PersistenceManager, WalEntry};
