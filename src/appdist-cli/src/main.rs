//! Appdist CLI - Main entry point.

use anyhow::Result;
use clap::Parser;

use appdist_cli::cli::{Cli, dispatch_command};
use appdist_cli::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_level, cli.log_file.as_deref())?;
    dispatch_command(cli).await
}
