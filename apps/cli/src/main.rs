//! Pokédex CLI — incremental Pokémon data ingestion and comparison reports.
//!
//! Populates a local SQLite store from PokeAPI, PoGoAPI and Bulbapedia a
//! budgeted batch at a time, then derives simple stat comparisons from it.

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
