mod cli;

use crate::cli::Cli;
use anyhow::{Context, Result};
use carledger::AssetLedger;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.global.config().context("invalid configuration")?;
    let ledger = AssetLedger::open(config).context("failed to open ledger")?;

    cli::execute(&ledger, cli.command).await
}

fn init_tracing() {
    // stdout carries the JSON results, so logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("carledger=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
