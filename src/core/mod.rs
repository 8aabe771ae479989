pub mod error;
pub mod model;

pub use error::{ErrorKind, LedgerError, RecordKind, Result};
pub use model::{Asset, Failure, Owner};
