mod charts;
mod cli;
mod config;
mod error;
mod merge;
mod model;
mod sheet;
mod snapshot;
mod timeline;
mod tracker;
mod util;
mod wiki;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Cli::parse().run().await
}
