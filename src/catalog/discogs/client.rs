use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace};

use crate::cache::Cache;
use crate::catalog::domain::{
    request_limiter, ApiLimiter, CatalogError, CatalogRelease, FreshnessWindows,
};
use crate::catalog::traits::CatalogLibrary;

use super::{adapter, dto};

const DEFAULT_BASE_URL: &str = "https://api.discogs.com";
const USER_AGENT: &str = concat!("releases-watcher/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: i64 = 100;

const ENTITY_ARTIST_SEARCH: &str = "discogs_artist_search";
const ENTITY_ARTIST_RELEASES: &str = "discogs_artist_releases";
const ENTITY_RELEASE: &str = "discogs_release";

/// Discogs-backed catalog.
pub struct DiscogsLibrary {
    http: reqwest::Client,
    base_url: String,
    token: String,
    cache: Cache,
    limiter: ApiLimiter,
    windows: FreshnessWindows,
    warm_releases: OnceCell<HashMap<String, dto::Release>>,
}

impl DiscogsLibrary {
    pub fn new(
        cache: Cache,
        token: String,
        rate_per_minute: u32,
        windows: FreshnessWindows,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
            cache,
            limiter: request_limiter(rate_per_minute),
            windows,
            warm_releases: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        self.limiter.until_ready().await;
        trace!(url, "discogs request");
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .send()
            .await
            .map_err(CatalogError::from_request)?
            .error_for_status()
            .map_err(CatalogError::from_request)?;
        response.json().await.map_err(CatalogError::from_request)
    }

    async fn artist_id(&self, artist: &str) -> Result<i64, CatalogError> {
        let url = format!(
            "{}/database/search?q={}&type=artist&per_page=5",
            self.base_url,
            urlencoding::encode(artist)
        );
        let search: dto::SearchResponse = self
            .cache
            .get_cached(ENTITY_ARTIST_SEARCH, artist, self.windows.artist_search, || {
                self.get_json(&url)
            })
            .await?;
        search
            .results
            .first()
            .map(|r| r.id)
            .ok_or_else(|| CatalogError::ArtistNotFound(artist.to_string()))
    }

    /// Main-role entries from the artist's paged release list.
    async fn main_releases(&self, artist_id: i64) -> Result<Vec<dto::ArtistReleaseRef>, CatalogError> {
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/artists/{}/releases?page={}&per_page={}",
                self.base_url, artist_id, page, PAGE_SIZE
            );
            let key = format!("{artist_id}_{page}");
            let response: dto::ArtistReleasesResponse = self
                .cache
                .get_cached(ENTITY_ARTIST_RELEASES, &key, self.windows.release, || {
                    self.get_json(&url)
                })
                .await?;
            entries.extend(
                response
                    .releases
                    .into_iter()
                    .filter(|r| r.role.as_deref() == Some("Main")),
            );
            if page >= response.pagination.pages {
                break;
            }
            page += 1;
        }
        Ok(entries)
    }

    async fn release(&self, release_id: i64) -> Result<dto::Release, CatalogError> {
        let key = release_id.to_string();
        if let Some(warm) = self.warm_releases.get() {
            if let Some(release) = warm.get(&key) {
                return Ok(release.clone());
            }
        }
        let url = format!("{}/releases/{}", self.base_url, release_id);
        self.cache
            .get_cached(ENTITY_RELEASE, &key, self.windows.release, || {
                self.get_json(&url)
            })
            .await
    }
}

#[async_trait]
impl CatalogLibrary for DiscogsLibrary {
    async fn warm(&self) -> Result<(), CatalogError> {
        self.warm_releases
            .get_or_try_init(|| async {
                let releases = self
                    .cache
                    .get_all_entities::<dto::Release>(ENTITY_RELEASE, self.windows.release)
                    .await?;
                debug!(count = releases.len(), "pre-warmed release cache");
                Ok::<_, CatalogError>(releases)
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn releases_for_artist(&self, artist: &str) -> Result<Vec<CatalogRelease>, CatalogError> {
        let artist_id = self.artist_id(artist).await?;
        let entries = self.main_releases(artist_id).await?;
        debug!(artist, entries = entries.len(), "listed main releases");

        let mut releases = Vec::new();
        for entry in entries {
            // A master entry points at its canonical pressing.
            let release_id = match entry.entry_type.as_str() {
                "master" => match entry.main_release {
                    Some(id) => id,
                    None => {
                        trace!(master = entry.id, "master without main release");
                        continue;
                    }
                },
                _ => entry.id,
            };
            let release = self.release(release_id).await?;
            if adapter::is_tracked(&release, artist_id) {
                releases.push(adapter::to_catalog_release(&release));
            }
        }
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn test_cache() -> Cache {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Cache::new(pool)
    }

    fn library(cache: Cache) -> DiscogsLibrary {
        DiscogsLibrary::new(cache, "test-token".into(), 50, FreshnessWindows::from_days(90, 10))
            .with_base_url("http://127.0.0.1:1")
    }

    fn detail(id: i64, title: &str, descriptions: &[&str], artist_id: i64) -> dto::Release {
        dto::Release {
            id,
            title: title.into(),
            year: Some(2016),
            formats: vec![dto::Format {
                name: "CD".into(),
                descriptions: descriptions.iter().map(|d| d.to_string()).collect(),
            }],
            styles: vec![],
            artists: vec![dto::ReleaseArtist {
                id: artist_id,
                name: "David Bowie".into(),
            }],
            uri: None,
        }
    }

    #[tokio::test]
    async fn resolution_follows_masters_and_filters_roles() {
        let cache = test_cache().await;
        cache
            .put(
                ENTITY_ARTIST_SEARCH,
                "David Bowie",
                &dto::SearchResponse {
                    results: vec![dto::SearchResult {
                        id: 10263,
                        title: "David Bowie".into(),
                    }],
                },
            )
            .await
            .unwrap();
        cache
            .put(
                ENTITY_ARTIST_RELEASES,
                "10263_1",
                &dto::ArtistReleasesResponse {
                    pagination: dto::Pagination { page: 1, pages: 1 },
                    releases: vec![
                        dto::ArtistReleaseRef {
                            id: 8898,
                            entry_type: "master".into(),
                            role: Some("Main".into()),
                            main_release: Some(371333),
                            title: "Blackstar".into(),
                            year: Some(2016),
                        },
                        dto::ArtistReleaseRef {
                            id: 125,
                            entry_type: "release".into(),
                            role: Some("Appearance".into()),
                            main_release: None,
                            title: "Guest Spot".into(),
                            year: Some(2001),
                        },
                    ],
                },
            )
            .await
            .unwrap();
        cache
            .put(
                ENTITY_RELEASE,
                "371333",
                &detail(371333, "Blackstar", &["LP", "Album"], 10263),
            )
            .await
            .unwrap();

        let library = library(cache);
        let releases = library.releases_for_artist("David Bowie").await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].id, "371333");
        assert_eq!(releases[0].kind, crate::model::Kind::Album);
    }

    #[tokio::test]
    async fn foreign_primary_artist_is_dropped() {
        let cache = test_cache().await;
        cache
            .put(
                ENTITY_ARTIST_SEARCH,
                "David Bowie",
                &dto::SearchResponse {
                    results: vec![dto::SearchResult {
                        id: 10263,
                        title: "David Bowie".into(),
                    }],
                },
            )
            .await
            .unwrap();
        cache
            .put(
                ENTITY_ARTIST_RELEASES,
                "10263_1",
                &dto::ArtistReleasesResponse {
                    pagination: dto::Pagination { page: 1, pages: 1 },
                    releases: vec![dto::ArtistReleaseRef {
                        id: 42,
                        entry_type: "release".into(),
                        role: Some("Main".into()),
                        main_release: None,
                        title: "Split Album".into(),
                        year: Some(1999),
                    }],
                },
            )
            .await
            .unwrap();
        cache
            .put(ENTITY_RELEASE, "42", &detail(42, "Split Album", &["Album"], 999))
            .await
            .unwrap();

        let library = library(cache);
        let releases = library.releases_for_artist("David Bowie").await.unwrap();
        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn aged_release_listing_is_refetched() {
        let cache = test_cache().await;
        cache
            .put(
                ENTITY_ARTIST_SEARCH,
                "David Bowie",
                &dto::SearchResponse {
                    results: vec![dto::SearchResult {
                        id: 10263,
                        title: "David Bowie".into(),
                    }],
                },
            )
            .await
            .unwrap();
        cache
            .put(
                ENTITY_ARTIST_RELEASES,
                "10263_1",
                &dto::ArtistReleasesResponse {
                    pagination: dto::Pagination { page: 1, pages: 1 },
                    releases: vec![],
                },
            )
            .await
            .unwrap();
        // Inside the 90-day search window but past the 10-day release
        // window: the listing must be refetched, which fails against the
        // unroutable base URL.
        cache
            .backdate(
                ENTITY_ARTIST_RELEASES,
                "10263_1",
                std::time::Duration::from_secs(20 * 86_400),
            )
            .await
            .unwrap();

        let library = library(cache);
        let err = library.releases_for_artist("David Bowie").await.unwrap_err();
        assert!(matches!(err, CatalogError::Network(_)));
    }

    #[tokio::test]
    async fn unknown_artist_is_not_found() {
        let cache = test_cache().await;
        cache
            .put(
                ENTITY_ARTIST_SEARCH,
                "Nobody",
                &dto::SearchResponse { results: vec![] },
            )
            .await
            .unwrap();
        let library = library(cache);
        let err = library.releases_for_artist("Nobody").await.unwrap_err();
        assert!(matches!(err, CatalogError::ArtistNotFound(_)));
    }
}
