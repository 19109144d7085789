//! Strata
//!
//! Schema-driven data API with relation inference, nested mutations and
//! cursor pagination.
//!
//! This is the main entry point for the command-line tool.

use strata_cli::{Cli, CliConfig, Parser};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;

    // RUST_LOG takes precedence over the flag and the config file
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level(&config)))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = strata_cli::VERSION, "Starting strata");
    strata_cli::run(cli, config).await
}
