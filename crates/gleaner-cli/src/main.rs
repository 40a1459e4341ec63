//! Gleaner - command-line entry point for batch document field extraction.

use clap::Parser;
use gleaner_cli::{commands, Cli, Command, ProfileStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let store = ProfileStore::load(&cli.config)?;
            commands::execute_run(args, &store).await?;
        }
        Command::Combos => {
            let store = ProfileStore::load(&cli.config)?;
            commands::execute_combos(&store)?;
        }
        Command::Validate => {
            commands::execute_validate(&cli.config)?;
        }
    }
    Ok(())
}
