//! zuppaclaude - main entry point

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use zuppaclaude::cli::{self, Cli};
use zuppaclaude::{config::Config, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!(
        "zuppaclaude v{} (backups: {})",
        env!("CARGO_PKG_VERSION"),
        config.backup_root().display()
    );

    cli::dispatch(args.command, Arc::new(config)).await?;

    Ok(())
}
