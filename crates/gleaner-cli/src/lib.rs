//! Gleaner CLI library.
//!
//! Argument parsing, the TOML profile store, input discovery, command
//! execution and report writing for the `gleaner` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod discover;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::ProfileStore;
pub use error::{CliError, Result};
