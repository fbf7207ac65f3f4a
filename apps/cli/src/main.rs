//! StoreFinder CLI — keeps a fresh snapshot of online store catalogs.
//!
//! Bootstraps the store and section registry, refreshes every section on a
//! fixed interval with a bounded pool of fetchers, and answers product
//! queries from the in-memory cache.

mod commands;
mod server;

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
