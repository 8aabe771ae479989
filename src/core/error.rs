use std::fmt;
use thiserror::Error;

/// Which record type an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Asset,
    Owner,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Asset => write!(f, "asset"),
            RecordKind::Owner => write!(f, "owner"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("The {kind} {id} does not exist")]
    NotFound { kind: RecordKind, id: String },

    #[error("The {kind} {id} already exists")]
    AlreadyExists { kind: RecordKind, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Owner {owner} has insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        owner: String,
        balance: i64,
        required: i64,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Commit conflict: {0}")]
    Conflict(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

/// Discriminant of [`LedgerError`] for callers that branch on the failure
/// class rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Serialization,
    Store,
    PreconditionFailed,
    InsufficientFunds,
    InvalidArgument,
    Conflict,
    Transaction,
    Lock,
}

impl LedgerError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            LedgerError::Serialization(_) => ErrorKind::Serialization,
            LedgerError::Store(_) => ErrorKind::Store,
            LedgerError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::TransactionError(_) => ErrorKind::Transaction,
            LedgerError::LockError(_) => ErrorKind::Lock,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for LedgerError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for LedgerError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LedgerError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
