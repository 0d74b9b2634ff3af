//! Sync orchestration for both library streams.
//!
//! `update_local_library` walks the collection on disk and publishes a
//! fresh snapshot of owned albums; `update_actual_library` resolves
//! every local artist against the configured catalog and publishes the
//! releases it should be watching. Both build into an unpublished write
//! version and flip the publish flag only on clean completion, so a
//! cancelled or failed run never becomes visible to the differ.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::catalog::{CatalogLibrary, CatalogRelease};
use crate::db::{self, Stream};
use crate::error::Result;
use crate::metadata;
use crate::model::{ActualAlbum, LocalAlbum};
use crate::scanner;

/// How many inserts between progress log lines.
const PROGRESS_EVERY: usize = 100;

/// Capacity of the catalog-to-persistence channel; bounds memory when
/// resolution outpaces inserts.
const RESULT_CHANNEL_CAPACITY: usize = 100;

pub struct Watcher {
    pool: SqlitePool,
    catalog: Arc<dyn CatalogLibrary>,
    root: PathBuf,
    excluded_path: Option<PathBuf>,
    workers: usize,
}

impl Watcher {
    pub fn new(
        pool: SqlitePool,
        catalog: Arc<dyn CatalogLibrary>,
        root: PathBuf,
        excluded_path: Option<PathBuf>,
        workers: usize,
    ) -> Self {
        Self {
            pool,
            catalog,
            root,
            excluded_path,
            workers: workers.max(1),
        }
    }

    /// Scan the collection and publish a new local snapshot.
    ///
    /// Tag reads run on a fixed-size pool of blocking tasks; unreadable
    /// files are logged and skipped. Pairs with an empty artist or album
    /// are flagged but still stored. On cancellation the partial version
    /// is left unpublished and the call returns Ok.
    #[instrument(skip(self, cancel))]
    pub async fn update_local_library(&self, cancel: CancellationToken) -> Result<()> {
        let version = db::create_version(&self.pool, Stream::Local).await?;
        let counter = Arc::new(AtomicUsize::new(0));

        let paths = scanner::scan(
            self.root.clone(),
            self.excluded_path.clone(),
            Arc::clone(&counter),
            cancel.clone(),
        );
        let tags = paths
            .map(|path| {
                tokio::task::spawn_blocking(move || {
                    let tag = metadata::read_album(&path);
                    (path, tag)
                })
            })
            .buffer_unordered(self.workers);
        let mut tags = std::pin::pin!(tags);

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut stored = 0usize;
        while let Some(joined) = tags.next().await {
            let (path, tag) = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "tag reader task failed");
                    continue;
                }
            };
            let tag = match tag {
                Ok(tag) => tag,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            if !tag.is_correct() {
                warn!(path = %path.display(), artist = %tag.artist, album = %tag.album, "incomplete tag");
            }
            if !seen.insert((tag.artist.clone(), tag.album.clone())) {
                continue;
            }
            db::insert_local_album(
                &self.pool,
                &LocalAlbum {
                    artist: tag.artist,
                    name: tag.album,
                    version_id: version,
                },
            )
            .await?;
            stored += 1;
            if stored % PROGRESS_EVERY == 0 {
                info!(stored, scanned = counter.load(Ordering::Relaxed), "local sync progress");
            }
        }

        if cancel.is_cancelled() {
            info!(version, "local sync cancelled, leaving version unpublished");
            return Ok(());
        }
        db::publish_version(&self.pool, Stream::Local, version).await?;
        info!(version, albums = stored, files = counter.load(Ordering::Relaxed), "local library published");
        Ok(())
    }

    /// Resolve every local artist against the catalog and publish a new
    /// actual snapshot.
    ///
    /// A failed artist resolution is logged and the run continues with
    /// the next artist; database errors abort the call. Cancellation
    /// leaves the write version unpublished.
    #[instrument(skip(self, cancel))]
    pub async fn update_actual_library(&self, cancel: CancellationToken) -> Result<()> {
        let artists = self.tracked_artists().await?;
        info!(artists = artists.len(), "resolving artists against catalog");

        self.catalog.warm().await?;
        let version = db::create_version(&self.pool, Stream::Actual).await?;

        let (tx, mut rx) = mpsc::channel::<(String, CatalogRelease)>(RESULT_CHANNEL_CAPACITY);
        let producer = tokio::spawn(resolve_artists(
            Arc::clone(&self.catalog),
            artists,
            tx,
            cancel.clone(),
        ));

        let mut stored = 0usize;
        while let Some((artist, release)) = rx.recv().await {
            db::insert_actual_album(
                &self.pool,
                &ActualAlbum {
                    id: release.id,
                    artist,
                    name: release.title,
                    year: release.year,
                    kind: release.kind.as_str().to_string(),
                    url: Some(release.url),
                    version_id: version,
                },
            )
            .await?;
            stored += 1;
            if stored % PROGRESS_EVERY == 0 {
                info!(stored, "actual sync progress");
            }
        }
        if let Err(e) = producer.await {
            warn!(error = %e, "catalog producer task failed");
        }

        if cancel.is_cancelled() {
            info!(version, "actual sync cancelled, leaving version unpublished");
            return Ok(());
        }
        db::publish_version(&self.pool, Stream::Actual, version).await?;
        info!(version, albums = stored, "actual library published");
        Ok(())
    }

    /// Distinct local artists minus the global exclusion list, compared
    /// on normalized names.
    async fn tracked_artists(&self) -> Result<Vec<String>> {
        let excluded: HashSet<String> = db::get_excluded_artists(&self.pool)
            .await?
            .iter()
            .map(|a| crate::diff::normalize(a))
            .collect();
        let artists = db::get_local_artists(&self.pool)
            .await?
            .into_iter()
            .filter(|a| !excluded.contains(&crate::diff::normalize(a)))
            .collect();
        Ok(artists)
    }
}

/// Producer side of the actual sync: one artist at a time through the
/// catalog, per-artist failures logged and skipped. Closes the channel
/// by dropping the sender when done.
async fn resolve_artists(
    catalog: Arc<dyn CatalogLibrary>,
    artists: Vec<String>,
    tx: mpsc::Sender<(String, CatalogRelease)>,
    cancel: CancellationToken,
) {
    let total = artists.len();
    for (n, artist) in artists.into_iter().enumerate() {
        if cancel.is_cancelled() {
            info!("catalog resolution cancelled");
            break;
        }
        info!(%artist, n = n + 1, of = total, "resolving artist");
        match catalog.releases_for_artist(&artist).await {
            Ok(releases) => {
                for release in releases {
                    if tx.send((artist.clone(), release)).await.is_err() {
                        // Consumer gave up; nothing left to produce for.
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(%artist, error = %e, "skipping artist after catalog failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    use crate::catalog::traits::mock::MockCatalog;
    use crate::catalog::CatalogError;
    use crate::model::Kind;

    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn release(id: &str, title: &str, year: i32) -> CatalogRelease {
        CatalogRelease {
            id: id.into(),
            title: title.into(),
            year: Some(year),
            kind: Kind::Album,
            url: format!("https://example.org/release/{id}"),
        }
    }

    async fn seed_local_artists(pool: &SqlitePool, artists: &[&str]) {
        let version = db::create_version(pool, Stream::Local).await.unwrap();
        for artist in artists {
            db::insert_local_album(
                pool,
                &LocalAlbum {
                    artist: artist.to_string(),
                    name: "Some Album".into(),
                    version_id: version,
                },
            )
            .await
            .unwrap();
        }
        db::publish_version(pool, Stream::Local, version).await.unwrap();
    }

    async fn published_version_count(pool: &SqlitePool, table: &str) -> i64 {
        let query = format!("SELECT COUNT(*) FROM {table} WHERE published = 1");
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(pool).await.unwrap();
        count
    }

    fn watcher(pool: SqlitePool, catalog: MockCatalog, root: PathBuf) -> Watcher {
        Watcher::new(pool, Arc::new(catalog), root, None, 4)
    }

    #[tokio::test]
    async fn local_sync_publishes_even_when_no_files_parse() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("junk.mp3"), b"not really audio").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let pool = test_pool().await;
        let w = watcher(pool.clone(), MockCatalog::new(), dir.path().to_path_buf());
        w.update_local_library(CancellationToken::new()).await.unwrap();

        assert_eq!(published_version_count(&pool, "local_version").await, 1);
        assert!(db::get_local_albums(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_local_sync_does_not_publish() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let w = watcher(pool.clone(), MockCatalog::new(), dir.path().to_path_buf());
        w.update_local_library(cancel).await.unwrap();
        assert_eq!(published_version_count(&pool, "local_version").await, 0);
    }

    #[tokio::test]
    async fn actual_sync_persists_and_publishes_catalog_releases() {
        let pool = test_pool().await;
        seed_local_artists(&pool, &["David Bowie"]).await;

        let catalog = MockCatalog::new().with_artist(
            "David Bowie",
            vec![
                release("r1", "Blackstar", 2016),
                release("r2", "The Next Day", 2013),
            ],
        );
        let w = watcher(pool.clone(), catalog, PathBuf::new());
        w.update_actual_library(CancellationToken::new()).await.unwrap();

        let albums = db::get_actual_albums(&pool).await.unwrap();
        assert_eq!(albums.len(), 2);
        assert!(albums.iter().all(|a| a.artist == "David Bowie"));
        assert!(albums.iter().all(|a| a.url.is_some()));
        assert_eq!(published_version_count(&pool, "actual_version").await, 1);
    }

    #[tokio::test]
    async fn actual_sync_skips_failing_artists() {
        let pool = test_pool().await;
        seed_local_artists(&pool, &["David Bowie", "Flaky Artist"]).await;

        let catalog = MockCatalog::new()
            .with_artist("David Bowie", vec![release("r1", "Blackstar", 2016)])
            .failing_for("Flaky Artist");
        let w = watcher(pool.clone(), catalog, PathBuf::new());
        w.update_actual_library(CancellationToken::new()).await.unwrap();

        let albums = db::get_actual_albums(&pool).await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].name, "Blackstar");
    }

    #[tokio::test]
    async fn actual_sync_never_queries_excluded_artists() {
        let pool = test_pool().await;
        seed_local_artists(&pool, &["David Bowie", "Milli Vanilli"]).await;
        sqlx::query("INSERT INTO excluded_artist (artist) VALUES ('milli vanilli')")
            .execute(&pool)
            .await
            .unwrap();

        let catalog =
            MockCatalog::new().with_artist("David Bowie", vec![release("r1", "Blackstar", 2016)]);
        let w = Watcher::new(pool.clone(), Arc::new(catalog), PathBuf::new(), None, 4);
        w.update_actual_library(CancellationToken::new()).await.unwrap();

        let albums = db::get_actual_albums(&pool).await.unwrap();
        assert_eq!(albums.len(), 1);
    }

    #[tokio::test]
    async fn actual_sync_warms_catalog_once() {
        let pool = test_pool().await;
        let catalog = Arc::new(MockCatalog::new());
        let w = Watcher::new(pool.clone(), catalog.clone(), PathBuf::new(), None, 4);
        w.update_actual_library(CancellationToken::new()).await.unwrap();
        assert_eq!(catalog.warm_calls.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.lookup_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_actual_sync_does_not_publish() {
        let pool = test_pool().await;
        seed_local_artists(&pool, &["David Bowie"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let catalog =
            MockCatalog::new().with_artist("David Bowie", vec![release("r1", "Blackstar", 2016)]);
        let w = watcher(pool.clone(), catalog, PathBuf::new());
        w.update_actual_library(cancel).await.unwrap();
        assert_eq!(published_version_count(&pool, "actual_version").await, 0);
    }

    #[tokio::test]
    async fn artist_not_found_is_skipped_not_fatal() {
        let pool = test_pool().await;
        seed_local_artists(&pool, &["Obscure Act"]).await;

        struct NotFound;
        #[async_trait::async_trait]
        impl CatalogLibrary for NotFound {
            async fn warm(&self) -> std::result::Result<(), CatalogError> {
                Ok(())
            }
            async fn releases_for_artist(
                &self,
                artist: &str,
            ) -> std::result::Result<Vec<CatalogRelease>, CatalogError> {
                Err(CatalogError::ArtistNotFound(artist.to_string()))
            }
        }

        let w = Watcher::new(pool.clone(), Arc::new(NotFound), PathBuf::new(), None, 4);
        w.update_actual_library(CancellationToken::new()).await.unwrap();
        assert!(db::get_actual_albums(&pool).await.unwrap().is_empty());
        assert_eq!(published_version_count(&pool, "actual_version").await, 1);
    }
}
