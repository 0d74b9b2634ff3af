//! Command-line interface for releases-watcher.
//!
//! Subcommands cover the full pipeline: sync the local collection,
//! sync the catalog, diff the two, and maintain the settings sheet.

mod commands;

pub use commands::{Cli, Commands, run_command};
