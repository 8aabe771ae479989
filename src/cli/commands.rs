use super::args::{AssetFields, Command, OwnerFields};
use anyhow::{Context, Result};
use carledger::{Asset, AssetLedger, Owner, asset_from_fields};
use serde::Serialize;
use serde_json::json;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

impl AssetFields {
    fn into_asset(self) -> Asset {
        asset_from_fields(
            &self.id,
            &self.brand,
            &self.model,
            &self.color,
            &self.owner,
            self.year,
            self.price,
            self.failures,
        )
    }
}

impl OwnerFields {
    fn into_owner(self) -> Owner {
        Owner::new(self.id, &self.name, &self.surname, &self.email, self.money)
    }
}

/// Run one subcommand against `ledger` and print its result.
pub async fn execute(ledger: &AssetLedger, command: Command) -> Result<()> {
    match command {
        Command::Init => {
            ledger.init_ledger().await?;
            print_json(&json!({ "initialized": true }))
        }
        Command::CreateAsset(fields) => {
            let asset = fields.into_asset();
            ledger.create_asset(&asset).await?;
            print_json(&asset)
        }
        Command::ReadAsset { id } => print_json(&ledger.read_asset(&id).await?),
        Command::UpdateAsset(fields) => {
            let asset = fields.into_asset();
            ledger.update_asset(&asset).await?;
            print_json(&asset)
        }
        Command::DeleteAsset { id } => {
            ledger.delete_asset(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
        Command::Transfer {
            asset_id,
            new_owner_id,
            accept_failures,
        } => {
            let owner = ledger
                .transfer_asset(&asset_id, &new_owner_id, accept_failures)
                .await?;
            print_json(&json!({ "asset": asset_id, "owner": owner }))
        }
        Command::RegisterFailure {
            asset_id,
            name,
            price,
        } => {
            let name = ledger.register_failure(&asset_id, &name, price).await?;
            let exists = ledger.asset_exists(&asset_id).await?;
            print_json(&json!({ "failure": name, "asset_exists": exists }))
        }
        Command::Repair { asset_id } => {
            let id = ledger.repair_failures(&asset_id).await?;
            print_json(&json!({ "repaired": id }))
        }
        Command::ChangeColor { id, color } => {
            let color = ledger.change_color(&id, &color).await?;
            print_json(&json!({ "asset": id, "color": color }))
        }
        Command::Find { color, owner } => {
            let assets = match (owner, color) {
                (Some(owner), Some(color)) => ledger.find_by_owner_and_color(&owner, &color).await?,
                (Some(owner), None) => ledger.find_by_owner(&owner).await?,
                (None, Some(color)) => ledger.find_by_color(&color).await?,
                (None, None) => ledger.get_all_assets().await?,
            };
            print_json(&assets)
        }
        Command::ReadOwner { id } => print_json(&ledger.read_owner(&id).await?),
        Command::CreateOwner(fields) => {
            let owner = fields.into_owner();
            ledger.create_owner(&owner).await?;
            print_json(&owner)
        }
        Command::UpdateOwner(fields) => {
            let owner = fields.into_owner();
            ledger.update_owner(&owner).await?;
            print_json(&owner)
        }
        Command::DeleteOwner { id } => {
            ledger.delete_owner(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
        Command::ListAssets => print_json(&ledger.get_all_assets().await?),
        Command::ListOwners => print_json(&ledger.get_all_owners().await?),
        Command::Stats => print_json(&ledger.stats().await?),
    }
}
