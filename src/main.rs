//! energy-forecast - Main Entry Point

use clap::Parser;
use energy_forecast::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "energy_forecast=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
