// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Optimistic transactions over the world state:
// - Each transaction reads from an immutable snapshot
// - Writes are buffered and applied as one unit on commit
// - Commit re-validates every key and range the transaction read
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;
pub mod stub;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use state::{Transaction, TransactionId, TransactionState};
pub use stub::{StateRange, WorldState};
