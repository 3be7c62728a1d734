//! `viewfind`: query a view-indexed document store from the shell.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use viewfind::cli::{self, Cli};
use viewfind::{logging, CouchClient, Finder};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_config())?;

    let config = cli.store.to_config();
    tracing::debug!(url = %config.url, database = %config.database, "connecting");
    let store = CouchClient::new(config).context("failed to configure store client")?;
    let finder = Finder::new(Arc::new(store));

    let lines = cli::run(&cli.command, &finder).await?;

    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}
