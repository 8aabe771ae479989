use crate::core::{Asset, LedgerError, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;
use tracing::{debug, info};

fn validate_failures(asset: &Asset) -> Result<()> {
    if let Some(failure) = asset.failures.iter().find(|f| f.price < 0) {
        return Err(LedgerError::InvalidArgument(format!(
            "failure '{}' on asset {} has negative price {}",
            failure.name, asset.id, failure.price
        )));
    }
    Ok(())
}

/// Issue a new asset. Fails with `AlreadyExists` if the id is taken.
pub fn create_asset(state: &mut dyn WorldState, asset: &Asset) -> Result<()> {
    validate_failures(asset)?;
    Asset::create(state, asset)?;
    info!(asset_id = %asset.id, owner_id = %asset.owner_id, "asset created");
    Ok(())
}

pub fn read_asset(state: &mut dyn WorldState, id: &str) -> Result<Asset> {
    let asset = Asset::read(state, id)?;
    debug!(asset_id = %id, "asset read");
    Ok(asset)
}

/// Overwrite every field of an existing asset.
pub fn update_asset(state: &mut dyn WorldState, asset: &Asset) -> Result<()> {
    validate_failures(asset)?;
    Asset::update(state, asset)?;
    info!(asset_id = %asset.id, "asset updated");
    Ok(())
}

pub fn delete_asset(state: &mut dyn WorldState, id: &str) -> Result<()> {
    Asset::delete(state, id)?;
    info!(asset_id = %id, "asset deleted");
    Ok(())
}

pub fn asset_exists(state: &mut dyn WorldState, id: &str) -> Result<bool> {
    Asset::exists(state, id)
}

/// Repaint an asset and return the color it now has.
pub fn change_color(state: &mut dyn WorldState, id: &str, new_color: &str) -> Result<String> {
    if new_color.is_empty() {
        return Err(LedgerError::InvalidArgument(
            "color must not be empty".to_string(),
        ));
    }
    let mut asset = Asset::read(state, id)?;
    let old_color = std::mem::replace(&mut asset.car_color, new_color.to_string());
    Asset::write(state, &asset)?;
    info!(asset_id = %id, old_color = %old_color, new_color = %new_color, "asset repainted");
    Ok(asset.car_color)
}
