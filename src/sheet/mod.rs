//! Spreadsheet collaborator: artist settings in, release report out.
//!
//! The report surface is a pair of CSV files in a configured directory,
//! one for per-artist notification settings (hand-edited by the owner)
//! and one for the generated release table. Both traits are async so a
//! hosted spreadsheet backend can slot in behind the same seam.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ArtistSetting, MatchedAlbum, NotificationSetting};

const SETTINGS_FILE: &str = "settings.csv";
const RELEASES_FILE: &str = "releases.csv";

const SETTINGS_HEADER: [&str; 2] = ["Artist", "Notification"];
const RELEASES_HEADER: [&str; 8] = [
    "Artist",
    "Album",
    "Local artist",
    "Local album",
    "Kind",
    "Year",
    "Link",
    "Status",
];

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {message}")]
    Malformed { row: usize, message: String },
}

/// Where per-artist notification settings come from.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn artist_settings(&self) -> Result<Vec<ArtistSetting>, SheetError>;

    /// Make sure every given artist has a settings row, preserving any
    /// existing notification choices.
    async fn update_artists(&self, artists: &[String]) -> Result<(), SheetError>;
}

/// Where the computed release table goes.
#[async_trait]
pub trait ReleaseReporter: Send + Sync {
    /// Replace the report contents with the given rows. Clear-then-write;
    /// the report itself is never diffed incrementally.
    async fn update_releases(&self, rows: &[MatchedAlbum]) -> Result<(), SheetError>;
}

/// CSV-file workbook in a local directory.
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn releases_path(&self) -> PathBuf {
        self.dir.join(RELEASES_FILE)
    }

    fn read_settings(&self, path: &Path) -> Result<Vec<ArtistSetting>, SheetError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut settings = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let artist = record.get(0).unwrap_or_default().trim();
            if artist.is_empty() {
                continue;
            }
            let raw = record.get(1).unwrap_or_default();
            let notification =
                NotificationSetting::parse(raw).map_err(|e| SheetError::Malformed {
                    row: i + 2,
                    message: e.to_string(),
                })?;
            settings.push(ArtistSetting {
                artist_name: artist.to_string(),
                notification,
            });
        }
        Ok(settings)
    }

    /// Atomic replace: write to a sibling temp file, then rename.
    fn write_atomically<F>(&self, path: &Path, write: F) -> Result<(), SheetError>
    where
        F: FnOnce(&mut csv::Writer<fs::File>) -> Result<(), SheetError>,
    {
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("csv.tmp");
        {
            let file = fs::File::create(&tmp)?;
            let mut writer = csv::Writer::from_writer(file);
            write(&mut writer)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsSource for CsvWorkbook {
    async fn artist_settings(&self) -> Result<Vec<ArtistSetting>, SheetError> {
        let settings = self.read_settings(&self.settings_path())?;
        debug!(count = settings.len(), "loaded artist settings");
        Ok(settings)
    }

    async fn update_artists(&self, artists: &[String]) -> Result<(), SheetError> {
        let path = self.settings_path();
        let mut settings = self.read_settings(&path)?;

        let mut added = 0usize;
        for artist in artists {
            let trimmed = artist.trim();
            if trimmed.is_empty() {
                continue;
            }
            let known = settings
                .iter()
                .any(|s| s.artist_name.eq_ignore_ascii_case(trimmed));
            if !known {
                settings.push(ArtistSetting {
                    artist_name: trimmed.to_string(),
                    notification: NotificationSetting::default(),
                });
                added += 1;
            }
        }
        settings.sort_by(|a, b| a.artist_name.to_lowercase().cmp(&b.artist_name.to_lowercase()));
        settings.dedup_by(|a, b| a.artist_name.eq_ignore_ascii_case(&b.artist_name));

        self.write_atomically(&path, |writer| {
            writer.write_record(SETTINGS_HEADER)?;
            for setting in &settings {
                writer.write_record([setting.artist_name.as_str(), setting.notification.as_str()])?;
            }
            Ok(())
        })?;
        info!(total = settings.len(), added, "updated settings sheet");
        Ok(())
    }
}

#[async_trait]
impl ReleaseReporter for CsvWorkbook {
    async fn update_releases(&self, rows: &[MatchedAlbum]) -> Result<(), SheetError> {
        self.write_atomically(&self.releases_path(), |writer| {
            writer.write_record(RELEASES_HEADER)?;
            for row in rows {
                writer.write_record(release_record(row))?;
            }
            Ok(())
        })?;
        info!(rows = rows.len(), "updated releases sheet");
        Ok(())
    }
}

fn release_record(row: &MatchedAlbum) -> [String; 8] {
    let (artist, album, kind, year, link) = match &row.actual {
        Some(actual) => (
            actual.artist.clone(),
            actual.name.clone(),
            actual.kind().to_string(),
            actual.year.map(|y| y.to_string()).unwrap_or_default(),
            actual.url.clone().unwrap_or_default(),
        ),
        None => Default::default(),
    };
    let (local_artist, local_album) = match &row.local {
        Some(local) => (local.artist.clone(), local.name.clone()),
        None => Default::default(),
    };
    [
        artist,
        album,
        local_artist,
        local_album,
        kind,
        year,
        link,
        row.status().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::model::{ActualAlbum, LocalAlbum};

    use super::*;

    fn workbook(dir: &TempDir) -> CsvWorkbook {
        CsvWorkbook::new(dir.path())
    }

    #[tokio::test]
    async fn missing_settings_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let settings = workbook(&dir).artist_settings().await.unwrap();
        assert!(settings.is_empty());
    }

    #[tokio::test]
    async fn update_artists_creates_sorted_defaults() {
        let dir = TempDir::new().unwrap();
        let wb = workbook(&dir);
        wb.update_artists(&["Queen".into(), "Arcade Fire".into()])
            .await
            .unwrap();

        let settings = wb.artist_settings().await.unwrap();
        let names: Vec<&str> = settings.iter().map(|s| s.artist_name.as_str()).collect();
        assert_eq!(names, vec!["Arcade Fire", "Queen"]);
        assert!(settings
            .iter()
            .all(|s| s.notification == NotificationSetting::AllReleases));
    }

    #[tokio::test]
    async fn update_artists_preserves_existing_choices() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "Artist,Notification\nQueen,Albums\n",
        )
        .unwrap();

        let wb = workbook(&dir);
        wb.update_artists(&["queen".into(), "David Bowie".into()])
            .await
            .unwrap();

        let settings = wb.artist_settings().await.unwrap();
        assert_eq!(settings.len(), 2);
        let queen = settings.iter().find(|s| s.artist_name == "Queen").unwrap();
        assert_eq!(queen.notification, NotificationSetting::AlbumsOnly);
        let bowie = settings.iter().find(|s| s.artist_name == "David Bowie").unwrap();
        assert_eq!(bowie.notification, NotificationSetting::AllReleases);
    }

    #[tokio::test]
    async fn blank_notification_defaults_to_all_releases() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "Artist,Notification\nQueen,\n",
        )
        .unwrap();
        let settings = workbook(&dir).artist_settings().await.unwrap();
        assert_eq!(settings[0].notification, NotificationSetting::AllReleases);
    }

    #[tokio::test]
    async fn unknown_notification_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "Artist,Notification\nQueen,Sometimes\n",
        )
        .unwrap();
        let err = workbook(&dir).artist_settings().await.unwrap_err();
        assert!(matches!(err, SheetError::Malformed { row: 2, .. }));
    }

    #[tokio::test]
    async fn update_releases_clears_then_writes() {
        let dir = TempDir::new().unwrap();
        let wb = workbook(&dir);

        let rows = vec![MatchedAlbum {
            local: Some(LocalAlbum {
                artist: "David Bowie".into(),
                name: "Blackstar".into(),
                version_id: 1,
            }),
            actual: Some(ActualAlbum {
                id: "r1".into(),
                artist: "David Bowie".into(),
                name: "Blackstar".into(),
                year: Some(2016),
                kind: "Album".into(),
                url: Some("https://musicbrainz.org/release/r1".into()),
                version_id: 1,
            }),
        }];
        wb.update_releases(&rows).await.unwrap();
        wb.update_releases(&[]).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join(RELEASES_FILE)).unwrap();
        // Second write replaced the first; only the header remains.
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.starts_with("Artist,Album,Local artist,Local album,Kind,Year,Link,Status"));
    }

    #[tokio::test]
    async fn release_rows_render_all_columns() {
        let row = MatchedAlbum {
            local: None,
            actual: Some(ActualAlbum {
                id: "r2".into(),
                artist: "Arcade Fire".into(),
                name: "WE".into(),
                year: Some(2022),
                kind: "Album".into(),
                url: Some("https://example.org/we".into()),
                version_id: 3,
            }),
        };
        let record = release_record(&row);
        assert_eq!(
            record,
            [
                "Arcade Fire",
                "WE",
                "",
                "",
                "Album",
                "2022",
                "https://example.org/we",
                "New"
            ]
            .map(String::from)
        );
    }
}
