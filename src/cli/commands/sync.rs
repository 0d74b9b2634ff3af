//! Local and actual library sync commands.

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::config::Config;
use crate::sync::Watcher;

use super::{build_catalog, open_pool};

/// Scan the collection and publish a new local snapshot.
pub fn cmd_update_local(rt: &Runtime, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(config).await?;
        let catalog = build_catalog(config, Cache::new(pool.clone()))?;
        let watcher = Watcher::new(
            pool,
            catalog,
            config.library.root.clone(),
            config.library.excluded_path.clone(),
            config.library.workers,
        );
        watcher.update_local_library(cancel).await?;
        println!("Local library updated.");
        Ok(())
    })
}

/// Resolve local artists against the catalog and publish a new actual
/// snapshot.
pub fn cmd_update_actual(rt: &Runtime, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(config).await?;
        let catalog = build_catalog(config, Cache::new(pool.clone()))?;
        let watcher = Watcher::new(
            pool,
            catalog,
            config.library.root.clone(),
            config.library.excluded_path.clone(),
            config.library.workers,
        );
        watcher.update_actual_library(cancel).await?;
        println!("Actual library updated.");
        Ok(())
    })
}
