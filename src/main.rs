//! Releases Watcher - keeps a music collection in sync with the world.
//!
//! Scans a local collection for owned albums, resolves each artist
//! against an external catalog (MusicBrainz or Discogs), and reports
//! the releases the collection is missing to a spreadsheet.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod metadata;
pub mod model;
pub mod scanner;
pub mod sheet;
pub mod sync;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::from_default_env()
                .add_directive("releases_watcher=info".parse().expect("valid directive")),
        )
        .init();

    cli::run_command(&args)
}
