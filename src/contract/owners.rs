use crate::core::{Asset, LedgerError, Owner, RecordKind, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;
use tracing::{debug, info};

pub fn read_owner(state: &mut dyn WorldState, id: &str) -> Result<Owner> {
    let owner = Owner::read(state, id)?;
    debug!(owner_id = %id, "owner read");
    Ok(owner)
}

pub fn owner_exists(state: &mut dyn WorldState, id: &str) -> Result<bool> {
    Owner::exists(state, id)
}

pub fn create_owner(state: &mut dyn WorldState, owner: &Owner) -> Result<()> {
    Owner::create(state, owner)?;
    info!(owner_id = %owner.id, money = owner.money, "owner created");
    Ok(())
}

pub fn update_owner(state: &mut dyn WorldState, owner: &Owner) -> Result<()> {
    Owner::update(state, owner)?;
    info!(owner_id = %owner.id, "owner updated");
    Ok(())
}

/// Remove an owner. Refused while any asset still names it as owner.
pub fn delete_owner(state: &mut dyn WorldState, id: &str) -> Result<()> {
    if !Owner::exists(state, id)? {
        return Err(LedgerError::not_found(RecordKind::Owner, id));
    }

    let held = Asset::scan_where(state, |asset| asset.owner_id == id)?;
    if !held.is_empty() {
        let ids: Vec<&str> = held.iter().map(|asset| asset.id.as_str()).collect();
        return Err(LedgerError::PreconditionFailed(format!(
            "owner {} still holds assets: {}",
            id,
            ids.join(", ")
        )));
    }

    Owner::delete(state, id)?;
    info!(owner_id = %id, "owner deleted");
    Ok(())
}
