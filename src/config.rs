use crate::core::{LedgerError, Result};
use crate::storage::DurabilityMode;
use std::path::PathBuf;
use std::str::FromStr;

/// What a transfer does when the asset has failures the buyer did not
/// accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockedTransferPolicy {
    /// Leave every record untouched and report the current owner.
    #[default]
    NoOp,
    /// Fail with `PreconditionFailed`.
    Reject,
}

impl FromStr for BlockedTransferPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "noop" | "no-op" => Ok(Self::NoOp),
            "reject" => Ok(Self::Reject),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown blocked transfer policy '{}'",
                other
            ))),
        }
    }
}

/// Whether owner balances may go below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalancePolicy {
    #[default]
    AllowNegative,
    /// Transfers and repairs that would overdraw an owner fail with
    /// `InsufficientFunds`.
    RequireNonNegative,
}

impl FromStr for BalancePolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "allow-negative" => Ok(Self::AllowNegative),
            "require-non-negative" => Ok(Self::RequireNonNegative),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown balance policy '{}'",
                other
            ))),
        }
    }
}

/// Business rules the contract operations consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerPolicy {
    pub blocked_transfer: BlockedTransferPolicy,
    pub balance: BalancePolicy,
}

impl BalancePolicy {
    /// Check that `owner_id` may pay `amount` out of `balance`. Credits
    /// (non-positive amounts) always pass.
    pub fn check_debit(&self, owner_id: &str, balance: i64, amount: i64) -> Result<()> {
        if *self == BalancePolicy::RequireNonNegative && amount > 0 && balance < amount {
            return Err(LedgerError::InsufficientFunds {
                owner: owner_id.to_string(),
                balance,
                required: amount,
            });
        }
        Ok(())
    }
}

/// Ledger configuration
///
/// # Examples
///
/// ```
/// use carledger::config::{LedgerConfig, BlockedTransferPolicy};
/// use carledger::storage::DurabilityMode;
///
/// let config = LedgerConfig::new()
///     .data_dir("/tmp/carledger")
///     .durability(DurabilityMode::Sync)
///     .blocked_transfer(BlockedTransferPolicy::Reject);
/// assert!(config.data_dir.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Where the WAL and snapshot live. `None` keeps the ledger in memory.
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityMode,

    /// WAL records between automatic snapshots.
    pub checkpoint_threshold: usize,

    pub policy: LedgerPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::default(),
            checkpoint_threshold: 1000,
            policy: LedgerPolicy::default(),
        }
    }

    pub fn data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn blocked_transfer(mut self, policy: BlockedTransferPolicy) -> Self {
        self.policy.blocked_transfer = policy;
        self
    }

    pub fn balance_policy(mut self, policy: BalancePolicy) -> Self {
        self.policy.balance = policy;
        self
    }

    /// Defaults overridden by `CARLEDGER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(dir) = lookup("CARLEDGER_DATA_DIR").filter(|d| !d.is_empty()) {
            config = config.data_dir(dir);
        }
        if let Some(mode) = lookup("CARLEDGER_DURABILITY") {
            config = config.durability(mode.parse()?);
        }
        if let Some(threshold) = lookup("CARLEDGER_CHECKPOINT_THRESHOLD") {
            let threshold = threshold.parse::<usize>().map_err(|e| {
                LedgerError::InvalidArgument(format!(
                    "invalid checkpoint threshold '{}': {}",
                    threshold, e
                ))
            })?;
            config = config.checkpoint_threshold(threshold);
        }
        if let Some(policy) = lookup("CARLEDGER_BLOCKED_TRANSFER") {
            config = config.blocked_transfer(policy.parse()?);
        }
        if let Some(policy) = lookup("CARLEDGER_BALANCE_POLICY") {
            config = config.balance_policy(policy.parse()?);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::new();
        assert!(config.data_dir.is_none());
        assert_eq!(config.durability, DurabilityMode::Async);
        assert_eq!(config.checkpoint_threshold, 1000);
        assert_eq!(config.policy.blocked_transfer, BlockedTransferPolicy::NoOp);
        assert_eq!(config.policy.balance, BalancePolicy::AllowNegative);
    }

    #[test]
    fn test_from_env_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("CARLEDGER_DATA_DIR", "/var/lib/carledger"),
            ("CARLEDGER_DURABILITY", "sync"),
            ("CARLEDGER_BLOCKED_TRANSFER", "reject"),
            ("CARLEDGER_BALANCE_POLICY", "require-non-negative"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/carledger")));
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.policy.blocked_transfer, BlockedTransferPolicy::Reject);
        assert_eq!(config.policy.balance, BalancePolicy::RequireNonNegative);
    }

    #[test]
    fn test_from_env_rejects_bad_value() {
        let err = LedgerConfig::from_lookup(lookup(&[("CARLEDGER_BALANCE_POLICY", "maybe")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_balance_check() {
        assert!(BalancePolicy::AllowNegative.check_debit("o1", 10, 15).is_ok());
        let err = BalancePolicy::RequireNonNegative
            .check_debit("o1", 10, 15)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(BalancePolicy::RequireNonNegative.check_debit("o1", -5, -20).is_ok());
    }
}
