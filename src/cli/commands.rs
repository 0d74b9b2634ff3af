//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented as a function that takes the shared
//! runtime plus parsed arguments and returns an `anyhow::Result<()>`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::Cache;
use crate::catalog::{CatalogLibrary, DiscogsLibrary, FreshnessWindows, MusicBrainzLibrary};
use crate::config::{self, Config};

mod report;
mod sync;

/// Releases watcher CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (defaults to the per-user config dir)
    #[arg(short, long, env = "RELEASES_WATCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Discogs personal access token (overrides the config file)
    #[arg(long, env = "DISCOGS_TOKEN", hide_env_values = true)]
    pub discogs_token: Option<String>,

    /// MusicBrainz bearer token (overrides the config file)
    #[arg(long, env = "MUSICBRAINZ_TOKEN", hide_env_values = true)]
    pub musicbrainz_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter config file to the per-user config directory
    Init,
    /// Scan the collection on disk and publish a new local snapshot
    UpdateLocal,
    /// Resolve local artists against the catalog and publish a new
    /// actual snapshot
    UpdateActual,
    /// Print catalog albums missing from the collection
    Diff,
    /// Write the full local/actual match table to the releases sheet
    Report,
    /// Add newly seen local artists to the settings sheet
    UpdateSettings,
}

/// Dispatch the parsed command on a fresh runtime.
pub fn run_command(args: &Cli) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    if args.discogs_token.is_some() {
        config.credentials.discogs_token = args.discogs_token.clone();
    }
    if args.musicbrainz_token.is_some() {
        config.credentials.musicbrainz_token = args.musicbrainz_token.clone();
    }
    let rt = Runtime::new().context("Failed to start async runtime")?;
    let cancel = interrupt_token(&rt);

    match &args.command {
        Commands::Init => {
            config::save(&config)?;
            if let Some(path) = config::config_path() {
                println!("Wrote config to {}", path.display());
            }
            Ok(())
        }
        Commands::UpdateLocal => sync::cmd_update_local(&rt, &config, cancel),
        Commands::UpdateActual => sync::cmd_update_actual(&rt, &config, cancel),
        Commands::Diff => report::cmd_diff(&rt, &config),
        Commands::Report => report::cmd_report(&rt, &config),
        Commands::UpdateSettings => report::cmd_update_settings(&rt, &config),
    }
}

/// Token cancelled on the first Ctrl-C, so in-flight syncs stop cleanly
/// without publishing a partial version.
fn interrupt_token(rt: &Runtime) -> CancellationToken {
    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current work");
            signal.cancel();
        }
    });
    cancel
}

/// Build the configured catalog backend over the shared cache.
fn build_catalog(config: &Config, cache: Cache) -> anyhow::Result<Arc<dyn CatalogLibrary>> {
    let windows = FreshnessWindows::from_days(
        config.catalog.artist_search_freshness_days,
        config.catalog.release_freshness_days,
    );
    match config.catalog.provider.as_str() {
        "musicbrainz" => Ok(Arc::new(MusicBrainzLibrary::new(
            cache,
            config.credentials.musicbrainz_token.clone(),
            config.catalog.rate_per_minute,
            windows,
        ))),
        "discogs" => {
            let token = config
                .credentials
                .discogs_token
                .clone()
                .context("The discogs provider requires credentials.discogs_token")?;
            Ok(Arc::new(DiscogsLibrary::new(
                cache,
                token,
                config.catalog.rate_per_minute,
                windows,
            )))
        }
        other => anyhow::bail!("Unknown catalog provider {other:?}"),
    }
}

async fn open_pool(config: &Config) -> anyhow::Result<sqlx::SqlitePool> {
    let url = crate::db::db_url(Some(config.storage.db_path.as_path()));
    crate::db::init_db(&url)
        .await
        .context("Failed to open database")
}
