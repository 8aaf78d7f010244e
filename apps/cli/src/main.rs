//! JobLens CLI: job posting link analysis.
//!
//! Renders every job link in a table, classifies the posting with an LLM,
//! and writes the flattened classification back next to the source columns.

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
