//! Ownership transfer: move an asset to a new owner and settle its price
//! between the two owners.

use super::failures::total_failure_cost;
use crate::config::{BlockedTransferPolicy, LedgerPolicy};
use crate::core::{Asset, LedgerError, Owner, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;
use tracing::{info, warn};

/// Money moved from the buyer to the seller: the price less outstanding
/// failures. Negative when the failures cost more than the asset.
pub fn settlement(asset: &Asset) -> Result<i64> {
    asset
        .price
        .checked_sub(total_failure_cost(asset))
        .ok_or_else(|| {
            LedgerError::InvalidArgument(format!("settlement for asset {} overflows", asset.id))
        })
}

fn adjust(owner: &mut Owner, delta: i64) -> Result<()> {
    owner.money = owner.money.checked_add(delta).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("balance of owner {} overflows", owner.id))
    })?;
    Ok(())
}

/// Transfer `asset_id` to `new_owner_id` and return the asset's owner
/// afterwards.
///
/// An asset with failures only changes hands when the buyer accepts them.
/// Otherwise `policy.blocked_transfer` decides between leaving everything
/// untouched and failing with `PreconditionFailed`.
pub fn transfer_asset(
    state: &mut dyn WorldState,
    asset_id: &str,
    new_owner_id: &str,
    accept_with_failures: bool,
    policy: &LedgerPolicy,
) -> Result<String> {
    let mut asset = Asset::read(state, asset_id)?;
    let mut new_owner = Owner::read(state, new_owner_id)?;
    let mut old_owner = Owner::read(state, &asset.owner_id)?;

    if asset.has_failures() && !accept_with_failures {
        return match policy.blocked_transfer {
            BlockedTransferPolicy::NoOp => {
                warn!(
                    asset_id = %asset_id,
                    owner_id = %asset.owner_id,
                    failures = asset.failures.len(),
                    "transfer blocked by unaccepted failures"
                );
                Ok(asset.owner_id)
            }
            BlockedTransferPolicy::Reject => Err(LedgerError::PreconditionFailed(format!(
                "asset {} has {} failure(s) the buyer did not accept",
                asset_id,
                asset.failures.len()
            ))),
        };
    }

    if old_owner.id == new_owner.id {
        info!(asset_id = %asset_id, owner_id = %new_owner_id, "asset already held by buyer");
        return Ok(asset.owner_id);
    }

    let amount = settlement(&asset)?;
    // A negative settlement flows from seller to buyer.
    if amount >= 0 {
        policy.balance.check_debit(&new_owner.id, new_owner.money, amount)?;
    } else {
        policy
            .balance
            .check_debit(&old_owner.id, old_owner.money, amount.saturating_neg())?;
    }

    let negated = amount.checked_neg().ok_or_else(|| {
        LedgerError::InvalidArgument(format!("settlement for asset {} overflows", asset_id))
    })?;
    adjust(&mut new_owner, negated)?;
    adjust(&mut old_owner, amount)?;
    asset.owner_id = new_owner.id.clone();

    Asset::write(state, &asset)?;
    Owner::write(state, &new_owner)?;
    Owner::write(state, &old_owner)?;

    info!(
        asset_id = %asset_id,
        from = %old_owner.id,
        to = %new_owner.id,
        settlement = amount,
        "asset transferred"
    );
    Ok(asset.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalancePolicy;
    use crate::core::{ErrorKind, Failure};
    use crate::repository::testing::MapState;

    fn ledger(failures: Vec<Failure>) -> MapState {
        let mut state = MapState::default();
        Owner::create(&mut state, &Owner::new("old", "Old", "Owner", "old@example.com", 500)).unwrap();
        Owner::create(&mut state, &Owner::new("new", "New", "Owner", "new@example.com", 2000)).unwrap();
        Asset::create(
            &mut state,
            &Asset::new("a1").owner("old").price(1000).with_failures(failures),
        )
        .unwrap();
        state
    }

    fn money(state: &mut MapState, id: &str) -> i64 {
        Owner::read(state, id).unwrap().money
    }

    #[test]
    fn test_clean_transfer_settles_full_price() {
        let mut state = ledger(vec![]);
        let owner = transfer_asset(&mut state, "a1", "new", false, &LedgerPolicy::default()).unwrap();

        assert_eq!(owner, "new");
        assert_eq!(money(&mut state, "new"), 1000);
        assert_eq!(money(&mut state, "old"), 1500);
        assert_eq!(Asset::read(&mut state, "a1").unwrap().owner_id, "new");
    }

    #[test]
    fn test_accepted_failures_discount_price() {
        let mut state = ledger(vec![Failure::new("engine", 100), Failure::new("Tyre", 50)]);
        transfer_asset(&mut state, "a1", "new", true, &LedgerPolicy::default()).unwrap();

        assert_eq!(money(&mut state, "new"), 2000 - 850);
        assert_eq!(money(&mut state, "old"), 500 + 850);
    }

    #[test]
    fn test_blocked_transfer_is_noop_by_default() {
        let mut state = ledger(vec![Failure::new("engine", 150)]);
        let before = state.entries.clone();

        let owner = transfer_asset(&mut state, "a1", "new", false, &LedgerPolicy::default()).unwrap();
        assert_eq!(owner, "old");
        assert_eq!(state.entries, before);
    }

    #[test]
    fn test_blocked_transfer_rejected_by_policy() {
        let mut state = ledger(vec![Failure::new("engine", 150)]);
        let policy = LedgerPolicy {
            blocked_transfer: BlockedTransferPolicy::Reject,
            ..LedgerPolicy::default()
        };
        let err = transfer_asset(&mut state, "a1", "new", false, &policy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_missing_parties() {
        let mut state = ledger(vec![]);
        let policy = LedgerPolicy::default();
        assert_eq!(
            transfer_asset(&mut state, "ghost", "new", false, &policy).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            transfer_asset(&mut state, "a1", "ghost", false, &policy).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        Asset::update(&mut state, &Asset::new("a1").owner("vanished").price(10)).unwrap();
        assert_eq!(
            transfer_asset(&mut state, "a1", "new", false, &policy).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_transfer_to_current_owner_moves_no_money() {
        let mut state = ledger(vec![]);
        let owner = transfer_asset(&mut state, "a1", "old", false, &LedgerPolicy::default()).unwrap();
        assert_eq!(owner, "old");
        assert_eq!(money(&mut state, "old"), 500);
    }

    #[test]
    fn test_negative_settlement_pays_buyer() {
        let mut state = MapState::default();
        Owner::create(&mut state, &Owner::new("old", "", "", "", 0)).unwrap();
        Owner::create(&mut state, &Owner::new("new", "", "", "", 0)).unwrap();
        Asset::create(
            &mut state,
            &Asset::new("a1").owner("old").price(100).with_failures(vec![Failure::new("x", 300)]),
        )
        .unwrap();

        transfer_asset(&mut state, "a1", "new", true, &LedgerPolicy::default()).unwrap();
        assert_eq!(money(&mut state, "new"), 200);
        assert_eq!(money(&mut state, "old"), -200);
    }

    #[test]
    fn test_store_error_mid_transfer_is_returned() {
        let mut state = ledger(vec![]);
        // Asset and buyer writes succeed, the seller write fails.
        state.fail_puts_after = Some(state.puts + 2);

        let err = transfer_asset(&mut state, "a1", "new", false, &LedgerPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
        assert_eq!(state.puts, 5);
        // Only the seller is untouched. Discarding the rest is the transaction's job.
        state.fail_puts_after = None;
        assert_eq!(money(&mut state, "old"), 500);
        assert_eq!(money(&mut state, "new"), 1000);
    }

    #[test]
    fn test_buyer_without_funds_refused() {
        let mut state = ledger(vec![]);
        let mut poor = Owner::read(&mut state, "new").unwrap();
        poor.money = 10;
        Owner::update(&mut state, &poor).unwrap();

        let policy = LedgerPolicy {
            balance: BalancePolicy::RequireNonNegative,
            ..LedgerPolicy::default()
        };
        let err = transfer_asset(&mut state, "a1", "new", false, &policy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(Asset::read(&mut state, "a1").unwrap().owner_id, "old");
    }
}
