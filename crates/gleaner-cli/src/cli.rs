//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gleaner - batch document field extraction harness.
#[derive(Debug, Parser)]
#[command(name = "gleaner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Profile store path
    #[arg(short, long, global = true, default_value = "gleaner.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a combo or an ad-hoc strategy list over an input directory
    Run(RunArgs),

    /// List configured combos and their strategies
    Combos,

    /// Check a profile store for consistency
    Validate,
}

/// Arguments for the `run` command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Combo name from the profile store
    #[arg(long, conflicts_with = "strategy")]
    pub combo: Option<String>,

    /// Ad-hoc strategy group names, repeatable
    #[arg(long)]
    pub strategy: Vec<String>,

    /// Directory of input documents
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory the report files are written into
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// Benchmark ground-truth CSV; enables evaluation mode
    #[arg(long)]
    pub benchmark: Option<PathBuf>,

    /// Checkpoint file path; enables checkpointing
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Resume from an existing checkpoint instead of starting over
    #[arg(long, requires = "checkpoint")]
    pub resume: bool,

    /// Only consider files with these extensions, repeatable
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Override the number of strategies allowed in flight
    #[arg(long)]
    pub max_concurrent_strategies: Option<usize>,

    /// Override the number of FileGroups allowed in flight per strategy
    #[arg(long)]
    pub max_concurrent_file_groups: Option<usize>,

    /// Override the attempt budget per file
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Override the per-call timeout in seconds
    #[arg(long)]
    pub call_timeout: Option<u64>,

    /// Bound the whole run to this many seconds
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Force streaming on or off for every strategy
    #[arg(long)]
    pub streaming: Option<bool>,

    /// Replace all collaborators with deterministic mocks (dry run)
    #[arg(long)]
    pub dry_run: bool,
}
