use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use records_cli::{cli::Cli, commands, config::Config, logging};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    logging::init_logging(&config.logging);
    info!("records-admin v{}", env!("CARGO_PKG_VERSION"));

    commands::run(cli.command, &config).await
}
