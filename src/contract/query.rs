use crate::core::{Asset, Owner, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;

pub fn get_all_assets(state: &mut dyn WorldState) -> Result<Vec<Asset>> {
    Asset::scan_all(state)
}

pub fn get_all_owners(state: &mut dyn WorldState) -> Result<Vec<Owner>> {
    Owner::scan_all(state)
}

pub fn find_by_color(state: &mut dyn WorldState, color: &str) -> Result<Vec<Asset>> {
    Asset::scan_where(state, |asset| asset.car_color == color)
}

pub fn find_by_owner(state: &mut dyn WorldState, owner_id: &str) -> Result<Vec<Asset>> {
    Asset::scan_where(state, |asset| asset.owner_id == owner_id)
}

pub fn find_by_owner_and_color(
    state: &mut dyn WorldState,
    owner_id: &str,
    color: &str,
) -> Result<Vec<Asset>> {
    Asset::scan_where(state, |asset| {
        asset.owner_id == owner_id && asset.car_color == color
    })
}
