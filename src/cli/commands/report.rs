//! Diffing and spreadsheet commands.

use tokio::runtime::Runtime;

use crate::config::Config;
use crate::db;
use crate::diff::Differ;
use crate::sheet::{CsvWorkbook, ReleaseReporter, SettingsSource};

use super::open_pool;

/// Print catalog albums missing from the collection.
pub fn cmd_diff(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(config).await?;
        let workbook = CsvWorkbook::new(&config.sheet.dir);
        let settings = workbook.artist_settings().await?;

        let differ = Differ::new(pool, config.catalog.cutoff_year);
        let missing = differ.diff(&settings).await?;
        for album in &missing {
            let year = album
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "????".into());
            let url = album.url.as_deref().unwrap_or("");
            println!("{} - {} ({}, {}) {}", album.artist, album.name, album.kind, year, url);
        }
        println!("{} albums missing from the collection.", missing.len());
        Ok(())
    })
}

/// Write the full match table to the releases sheet.
pub fn cmd_report(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(config).await?;
        let workbook = CsvWorkbook::new(&config.sheet.dir);
        let settings = workbook.artist_settings().await?;

        let differ = Differ::new(pool, config.catalog.cutoff_year);
        let rows = differ.matched(&settings).await?;
        workbook.update_releases(&rows).await?;
        println!("Wrote {} rows to the releases sheet.", rows.len());
        Ok(())
    })
}

/// Add newly seen local artists to the settings sheet, preserving
/// existing notification choices.
pub fn cmd_update_settings(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(config).await?;
        let artists = db::get_local_artists(&pool).await?;
        let workbook = CsvWorkbook::new(&config.sheet.dir);
        workbook.update_artists(&artists).await?;
        println!("Settings sheet covers {} artists.", artists.len());
        Ok(())
    })
}
