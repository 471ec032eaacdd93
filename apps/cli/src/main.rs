//! Prospector CLI: company enrichment orchestrator tooling.
//!
//! Manages the application config and the resumable batch store. Enrichment
//! runs themselves are driven by embedders supplying the extraction agents.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
