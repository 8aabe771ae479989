// ============================================================================
// carledger Library
// ============================================================================

//! Vehicle ownership ledger.
//!
//! Assets (cars) and their Owners live in an ordered key/value world state.
//! The ledger registers failures against assets, writes off total losses,
//! bills repairs to owners and moves assets between owners while settling
//! the price between them.
//!
//! Layers, bottom up:
//! - [`storage`]: versioned ordered map with optional WAL and snapshots
//! - [`transaction`]: snapshot reads and buffered writes behind the
//!   [`WorldState`] facade, committed atomically
//! - [`codec`] and [`repository`]: namespaced keys and per-entity CRUD
//! - [`contract`]: the ledger operations themselves
//! - [`facade`]: [`AssetLedger`], which runs each operation as one transaction

pub mod codec;
pub mod config;
pub mod contract;
pub mod core;
pub mod facade;
pub mod repository;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use config::{BalancePolicy, BlockedTransferPolicy, LedgerConfig, LedgerPolicy};
pub use core::{Asset, ErrorKind, Failure, LedgerError, Owner, RecordKind, Result};
pub use facade::{AssetLedger, LedgerStats, asset_from_fields};
pub use repository::Repository;
pub use transaction::WorldState;
