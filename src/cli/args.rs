use carledger::Failure;
use carledger::config::{BalancePolicy, BlockedTransferPolicy, LedgerConfig};
use carledger::storage::DurabilityMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carledger")]
#[command(about = "Vehicle ownership ledger: assets, owners, failures and transfers")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalOpts {
    /// Directory holding the WAL and snapshot. Without it the ledger lives
    /// only for this invocation.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// sync, async or none
    #[arg(long, global = true)]
    pub durability: Option<DurabilityMode>,

    /// Fail transfers blocked by unaccepted failures instead of ignoring them.
    #[arg(long, global = true)]
    pub reject_blocked_transfers: bool,

    /// Refuse transfers and repairs that would overdraw an owner.
    #[arg(long, global = true)]
    pub require_non_negative: bool,
}

impl GlobalOpts {
    /// Environment configuration with command-line flags applied on top.
    pub fn config(&self) -> carledger::Result<LedgerConfig> {
        let mut config = LedgerConfig::from_env()?;
        if let Some(dir) = &self.data_dir {
            config = config.data_dir(dir);
        }
        if let Some(mode) = self.durability {
            config = config.durability(mode);
        }
        if self.reject_blocked_transfers {
            config = config.blocked_transfer(BlockedTransferPolicy::Reject);
        }
        if self.require_non_negative {
            config = config.balance_policy(BalancePolicy::RequireNonNegative);
        }
        Ok(config)
    }
}

#[derive(Args)]
pub struct AssetFields {
    pub id: String,
    #[arg(long, default_value = "")]
    pub brand: String,
    #[arg(long, default_value = "")]
    pub model: String,
    #[arg(long, default_value = "")]
    pub color: String,
    #[arg(long, default_value = "")]
    pub owner: String,
    #[arg(long, default_value_t = 0)]
    pub year: i32,
    #[arg(long, default_value_t = 0)]
    pub price: i64,
    /// Failure as NAME=PRICE, repeatable.
    #[arg(long = "failure", value_parser = parse_failure)]
    pub failures: Vec<Failure>,
}

#[derive(Args)]
pub struct OwnerFields {
    pub id: String,
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, default_value = "")]
    pub surname: String,
    #[arg(long, default_value = "")]
    pub email: String,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub money: i64,
}

#[derive(Subcommand)]
pub enum Command {
    /// Seed the bootstrap assets and owners.
    Init,
    CreateAsset(AssetFields),
    ReadAsset {
        id: String,
    },
    UpdateAsset(AssetFields),
    DeleteAsset {
        id: String,
    },
    Transfer {
        asset_id: String,
        new_owner_id: String,
        /// Buyer takes the asset with its outstanding failures.
        #[arg(long)]
        accept_failures: bool,
    },
    RegisterFailure {
        asset_id: String,
        name: String,
        price: i64,
    },
    Repair {
        asset_id: String,
    },
    ChangeColor {
        id: String,
        color: String,
    },
    /// Assets matching every given filter.
    Find {
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    ReadOwner {
        id: String,
    },
    CreateOwner(OwnerFields),
    UpdateOwner(OwnerFields),
    DeleteOwner {
        id: String,
    },
    ListAssets,
    ListOwners,
    Stats,
}

fn parse_failure(raw: &str) -> Result<Failure, String> {
    let (name, price) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=PRICE, got '{}'", raw))?;
    let price = price
        .parse::<i64>()
        .map_err(|e| format!("invalid failure price '{}': {}", price, e))?;
    Ok(Failure::new(name, price))
}
