use crate::config::{LedgerConfig, LedgerPolicy};
use crate::contract;
use crate::core::{Asset, Failure, Owner, Result};
use crate::storage::{InMemoryStorage, StorageEngine};
use crate::transaction::{TransactionManager, TransactionStats, WorldState};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters describing a running ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub transactions: TransactionStats,
    /// Keys currently in the world state, across both namespaces.
    pub entries: usize,
}

/// Asset ledger host.
///
/// Every public operation runs as one transaction: it reads a consistent
/// snapshot, buffers its writes, and commits them all at once. If the
/// operation fails, nothing it wrote is applied.
///
/// # Examples
///
/// ```
/// use carledger::AssetLedger;
///
/// # #[tokio::main]
/// # async fn main() -> carledger::Result<()> {
/// let ledger = AssetLedger::new();
/// ledger.init_ledger().await?;
///
/// let owner = ledger.transfer_asset("asset8", "owner2", false).await?;
/// assert_eq!(owner, "owner2");
/// assert_eq!(ledger.read_owner("owner2").await?.money, 300 - 1000);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AssetLedger {
    transaction_manager: Arc<TransactionManager>,
    policy: LedgerPolicy,
}

impl Default for AssetLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLedger {
    /// Purely in-memory ledger with default policies.
    pub fn new() -> Self {
        Self::with_engine(Arc::new(InMemoryStorage::new()), LedgerPolicy::default())
    }

    /// Open a ledger as described by `config`, recovering persisted state
    /// when a data directory is set.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let storage = match &config.data_dir {
            Some(dir) => {
                InMemoryStorage::open(dir, config.durability, config.checkpoint_threshold)?
            }
            None => InMemoryStorage::new(),
        };
        info!(
            persistent = config.data_dir.is_some(),
            durability = ?config.durability,
            policy = ?config.policy,
            "ledger opened"
        );
        Ok(Self::with_engine(Arc::new(storage), config.policy))
    }

    pub fn with_engine(engine: Arc<dyn StorageEngine>, policy: LedgerPolicy) -> Self {
        Self {
            transaction_manager: Arc::new(TransactionManager::new(engine)),
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.transaction_manager
    }

    /// Run `operation` in its own transaction.
    ///
    /// Commits when it returns `Ok`, rolls back when it returns `Err`. Use
    /// this to compose several ledger operations into one atomic unit.
    pub async fn execute<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WorldState) -> Result<T>,
    {
        let tm = &self.transaction_manager;
        let mut transaction = tm.begin().await?;

        match operation(&mut transaction) {
            Ok(value) => {
                tm.commit(&mut transaction).await?;
                Ok(value)
            }
            Err(err) => {
                debug!(txn = %transaction.id(), error = %err, "operation failed");
                if let Err(rollback_err) = tm.rollback(&mut transaction) {
                    warn!(txn = %transaction.id(), error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // Assets
    // ========================================================================

    pub async fn create_asset(&self, asset: &Asset) -> Result<()> {
        self.execute(|state| contract::create_asset(state, asset)).await
    }

    pub async fn read_asset(&self, id: &str) -> Result<Asset> {
        self.execute(|state| contract::read_asset(state, id)).await
    }

    pub async fn update_asset(&self, asset: &Asset) -> Result<()> {
        self.execute(|state| contract::update_asset(state, asset)).await
    }

    pub async fn delete_asset(&self, id: &str) -> Result<()> {
        self.execute(|state| contract::delete_asset(state, id)).await
    }

    pub async fn asset_exists(&self, id: &str) -> Result<bool> {
        self.execute(|state| contract::asset_exists(state, id)).await
    }

    pub async fn change_color(&self, id: &str, new_color: &str) -> Result<String> {
        self.execute(|state| contract::change_color(state, id, new_color))
            .await
    }

    // ========================================================================
    // Owners
    // ========================================================================

    pub async fn read_owner(&self, id: &str) -> Result<Owner> {
        self.execute(|state| contract::read_owner(state, id)).await
    }

    pub async fn owner_exists(&self, id: &str) -> Result<bool> {
        self.execute(|state| contract::owner_exists(state, id)).await
    }

    pub async fn create_owner(&self, owner: &Owner) -> Result<()> {
        self.execute(|state| contract::create_owner(state, owner)).await
    }

    pub async fn update_owner(&self, owner: &Owner) -> Result<()> {
        self.execute(|state| contract::update_owner(state, owner)).await
    }

    pub async fn delete_owner(&self, id: &str) -> Result<()> {
        self.execute(|state| contract::delete_owner(state, id)).await
    }

    // ========================================================================
    // Failures and transfers
    // ========================================================================

    pub async fn register_failure(&self, asset_id: &str, name: &str, price: i64) -> Result<String> {
        self.execute(|state| contract::register_failure(state, asset_id, name, price))
            .await
    }

    pub async fn repair_failures(&self, asset_id: &str) -> Result<String> {
        let balance = self.policy.balance;
        self.execute(|state| contract::repair_failures(state, asset_id, balance))
            .await
    }

    /// Move an asset to `new_owner_id` and return its owner afterwards.
    pub async fn transfer_asset(
        &self,
        asset_id: &str,
        new_owner_id: &str,
        accept_with_failures: bool,
    ) -> Result<String> {
        let policy = self.policy;
        self.execute(|state| {
            contract::transfer_asset(state, asset_id, new_owner_id, accept_with_failures, &policy)
        })
        .await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_all_assets(&self) -> Result<Vec<Asset>> {
        self.execute(contract::get_all_assets).await
    }

    pub async fn get_all_owners(&self) -> Result<Vec<Owner>> {
        self.execute(contract::get_all_owners).await
    }

    pub async fn find_by_color(&self, color: &str) -> Result<Vec<Asset>> {
        self.execute(|state| contract::find_by_color(state, color)).await
    }

    pub async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Asset>> {
        self.execute(|state| contract::find_by_owner(state, owner_id))
            .await
    }

    pub async fn find_by_owner_and_color(&self, owner_id: &str, color: &str) -> Result<Vec<Asset>> {
        self.execute(|state| contract::find_by_owner_and_color(state, owner_id, color))
            .await
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub async fn init_ledger(&self) -> Result<()> {
        self.execute(contract::init_ledger).await
    }

    /// Total failure cost of a stored asset.
    pub async fn failure_cost(&self, asset_id: &str) -> Result<i64> {
        let asset = self.read_asset(asset_id).await?;
        Ok(contract::total_failure_cost(&asset))
    }

    pub async fn stats(&self) -> Result<LedgerStats> {
        Ok(LedgerStats {
            transactions: self.transaction_manager.stats(),
            entries: self.transaction_manager.engine().entry_count().await?,
        })
    }

    /// Write a snapshot now instead of waiting for the WAL threshold.
    pub async fn checkpoint(&self) -> Result<()> {
        self.transaction_manager.engine().checkpoint().await
    }
}

/// Build an [`Asset`] from its individual fields, in record order.
#[allow(clippy::too_many_arguments)]
pub fn asset_from_fields(
    id: &str,
    brand: &str,
    model: &str,
    color: &str,
    owner_id: &str,
    production_year: i32,
    price: i64,
    failures: Vec<Failure>,
) -> Asset {
    Asset::new(id)
        .brand(brand)
        .model(model)
        .color(color)
        .owner(owner_id)
        .year(production_year)
        .price(price)
        .with_failures(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BalancePolicy, BlockedTransferPolicy};
    use crate::core::ErrorKind;
    use crate::repository::Repository;

    #[tokio::test]
    async fn test_operation_commits() {
        let ledger = AssetLedger::new();
        ledger.init_ledger().await.unwrap();
        assert!(ledger.asset_exists("asset7").await.unwrap());
        assert_eq!(ledger.stats().await.unwrap().entries, 4);
    }

    #[test]
    fn test_open_keeps_configured_policy() {
        let config = LedgerConfig::new()
            .balance_policy(BalancePolicy::RequireNonNegative)
            .blocked_transfer(BlockedTransferPolicy::Reject);
        let ledger = AssetLedger::open(config).unwrap();
        assert_eq!(
            ledger.policy().balance,
            BalancePolicy::RequireNonNegative
        );
        assert_eq!(
            ledger.policy().blocked_transfer,
            BlockedTransferPolicy::Reject
        );
    }

    #[tokio::test]
    async fn test_failed_operation_rolls_back() {
        let ledger = AssetLedger::new();
        let err = ledger
            .execute(|state| {
                Asset::create(state, &Asset::new("a1"))?;
                Asset::create(state, &Asset::new("a1"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(!ledger.asset_exists("a1").await.unwrap());

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.transactions.rolled_back, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_failure_cost() {
        let ledger = AssetLedger::new();
        ledger.init_ledger().await.unwrap();
        assert_eq!(ledger.failure_cost("asset7").await.unwrap(), 150);
        assert_eq!(ledger.failure_cost("asset8").await.unwrap(), 0);
    }

    #[test]
    fn test_asset_from_fields() {
        let asset = asset_from_fields("a1", "Fiat", "Punto", "Red", "o1", 2005, 900, vec![]);
        assert_eq!(asset, Asset::new("a1").brand("Fiat").model("Punto").color("Red").owner("o1").year(2005).price(900));
    }
}
