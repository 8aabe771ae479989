//! Ledger operations.
//!
//! Each function here is one logical operation against a [`WorldState`]
//! handle passed in by the caller. The functions read what they need,
//! compute the new records in memory and write them back through the same
//! handle; they never commit. Running them inside a transaction, and
//! discarding its writes when they fail, is the caller's job (see
//! [`crate::facade::AssetLedger`]).
//!
//! [`WorldState`]: crate::transaction::WorldState

pub mod assets;
pub mod bootstrap;
pub mod failures;
pub mod owners;
pub mod query;
pub mod transfer;

pub use assets::{asset_exists, change_color, create_asset, delete_asset, read_asset, update_asset};
pub use bootstrap::init_ledger;
pub use failures::{register_failure, repair_failures, total_failure_cost};
pub use owners::{create_owner, delete_owner, owner_exists, read_owner, update_owner};
pub use query::{find_by_color, find_by_owner, find_by_owner_and_color, get_all_assets, get_all_owners};
pub use transfer::{settlement, transfer_asset};
