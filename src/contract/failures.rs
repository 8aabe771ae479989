//! Failure accounting: registration with total-loss detection, and repair
//! billed to the current owner.

use crate::config::BalancePolicy;
use crate::core::{Asset, Failure, LedgerError, Owner, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;
use tracing::info;

/// Sum of the prices of every failure on `asset`. Saturates instead of
/// overflowing.
pub fn total_failure_cost(asset: &Asset) -> i64 {
    asset
        .failures
        .iter()
        .fold(0i64, |total, failure| total.saturating_add(failure.price))
}

/// Record a failure on an asset and return its name.
///
/// Once the accumulated cost reaches the asset's price the asset is a total
/// loss and is deleted instead of updated.
pub fn register_failure(
    state: &mut dyn WorldState,
    asset_id: &str,
    name: &str,
    price: i64,
) -> Result<String> {
    if price < 0 {
        return Err(LedgerError::InvalidArgument(format!(
            "failure price must not be negative, got {}",
            price
        )));
    }

    let mut asset = Asset::read(state, asset_id)?;
    asset.failures.push(Failure::new(name, price));
    let total = total_failure_cost(&asset);

    if total < asset.price {
        Asset::write(state, &asset)?;
        info!(asset_id = %asset_id, failure = %name, total_cost = total, "failure registered");
    } else {
        Asset::delete(state, asset_id)?;
        info!(
            asset_id = %asset_id,
            total_cost = total,
            price = asset.price,
            "asset written off as total loss"
        );
    }

    Ok(name.to_string())
}

/// Clear every failure on an asset, charging the repair to its owner.
/// Returns the asset id.
pub fn repair_failures(
    state: &mut dyn WorldState,
    asset_id: &str,
    policy: BalancePolicy,
) -> Result<String> {
    let mut asset = Asset::read(state, asset_id)?;
    let cost = total_failure_cost(&asset);
    let mut owner = Owner::read(state, &asset.owner_id)?;

    policy.check_debit(&owner.id, owner.money, cost)?;
    owner.money = owner.money.checked_sub(cost).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("balance of owner {} overflows", owner.id))
    })?;
    asset.failures.clear();

    Asset::write(state, &asset)?;
    Owner::write(state, &owner)?;
    info!(asset_id = %asset_id, owner_id = %owner.id, cost, "failures repaired");
    Ok(asset.id)
}
