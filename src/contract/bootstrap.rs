use crate::core::{Asset, Failure, Owner, Result};
use crate::repository::Repository;
use crate::transaction::WorldState;
use tracing::info;

/// Assets written by [`init_ledger`].
pub fn seed_assets() -> Vec<Asset> {
    let template = |id: &str| {
        Asset::new(id)
            .brand("blue")
            .model("proba")
            .color("Tomoko")
            .owner("owner1")
            .year(1000)
            .price(1000)
    };
    vec![
        template("asset7").with_failures(vec![
            Failure::new("engine", 100),
            Failure::new("Tyre", 50),
        ]),
        template("asset8"),
    ]
}

/// Owners written by [`init_ledger`].
pub fn seed_owners() -> Vec<Owner> {
    ["owner1", "owner2"]
        .into_iter()
        .map(|id| Owner::new(id, "blue", "Tomoko", "proba", 300))
        .collect()
}

/// Populate an empty ledger with the bootstrap assets and owners.
///
/// Fails with `AlreadyExists` on the first seed id already present; within a
/// transaction nothing is written in that case.
pub fn init_ledger(state: &mut dyn WorldState) -> Result<()> {
    let assets = seed_assets();
    let owners = seed_owners();

    for asset in &assets {
        Asset::create(state, asset)?;
    }
    for owner in &owners {
        Owner::create(state, owner)?;
    }

    info!(assets = assets.len(), owners = owners.len(), "ledger initialized");
    Ok(())
}
