//! Binary crate for the `weather-pipeline` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Building one pipeline per process and mapping its outcome to an exit status

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cmd = cli::Cli::parse();
    cmd.run().await
}
