//! wikireq CLI: Confluence requirement enrichment.
//!
//! Loads a wiki page, splices requirement definitions next to their markers,
//! and prints the page as prompt-ready plain text.

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
