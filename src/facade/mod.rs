pub mod ledger;

pub use ledger::{AssetLedger, LedgerStats, asset_from_fields};
