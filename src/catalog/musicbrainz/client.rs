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

const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = concat!("releases-watcher/", env!("CARGO_PKG_VERSION"));
const BROWSE_PAGE_SIZE: i64 = 100;

const ENTITY_ARTIST_SEARCH: &str = "musicbrainz_artist_search";
const ENTITY_RELEASE_GROUPS: &str = "musicbrainz_artist_releasegroups";
const ENTITY_RELEASE_GROUP: &str = "musicbrainz_releasegroup";
const ENTITY_RELEASE: &str = "musicbrainz_release";

/// MusicBrainz-backed catalog.
pub struct MusicBrainzLibrary {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    cache: Cache,
    limiter: ApiLimiter,
    windows: FreshnessWindows,
    /// Snapshot of cached release lookups, loaded once per run so the
    /// hot path avoids a database read per release.
    warm_releases: OnceCell<HashMap<String, dto::Release>>,
}

impl MusicBrainzLibrary {
    pub fn new(
        cache: Cache,
        token: Option<String>,
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
        trace!(url, "musicbrainz request");
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(CatalogError::from_request)?
            .error_for_status()
            .map_err(CatalogError::from_request)?;
        response.json().await.map_err(CatalogError::from_request)
    }

    /// Resolve an artist name to an MBID via the cached search endpoint.
    async fn artist_id(&self, artist: &str) -> Result<String, CatalogError> {
        let url = format!(
            "{}/artist?query={}&limit=5&fmt=json",
            self.base_url,
            urlencoding::encode(artist)
        );
        let search: dto::ArtistSearchResponse = self
            .cache
            .get_cached(ENTITY_ARTIST_SEARCH, artist, self.windows.artist_search, || {
                self.get_json(&url)
            })
            .await?;
        search
            .artists
            .first()
            .map(|a| a.id.clone())
            .ok_or_else(|| CatalogError::ArtistNotFound(artist.to_string()))
    }

    /// All release groups for an artist, paged through the browse API.
    async fn release_groups(&self, artist_id: &str) -> Result<Vec<dto::ReleaseGroup>, CatalogError> {
        let mut groups = Vec::new();
        let mut offset = 0;
        loop {
            let url = format!(
                "{}/release-group?artist={}&limit={}&offset={}&fmt=json",
                self.base_url, artist_id, BROWSE_PAGE_SIZE, offset
            );
            let key = format!("{artist_id}_{offset}");
            let page: dto::ReleaseGroupBrowseResponse = self
                .cache
                .get_cached(ENTITY_RELEASE_GROUPS, &key, self.windows.release, || {
                    self.get_json(&url)
                })
                .await?;
            let fetched = page.release_groups.len() as i64;
            groups.extend(page.release_groups);
            offset += fetched;
            if fetched < BROWSE_PAGE_SIZE || offset >= page.count {
                break;
            }
        }
        Ok(groups)
    }

    /// The canonical release for a release group: the first release
    /// listed on the group lookup.
    async fn canonical_release_id(&self, group_id: &str) -> Result<Option<String>, CatalogError> {
        let url = format!(
            "{}/release-group/{}?inc=releases&fmt=json",
            self.base_url, group_id
        );
        let group: dto::ReleaseGroup = self
            .cache
            .get_cached(ENTITY_RELEASE_GROUP, group_id, self.windows.release, || {
                self.get_json(&url)
            })
            .await?;
        Ok(group.releases.first().map(|r| r.id.clone()))
    }

    async fn release(&self, release_id: &str) -> Result<dto::Release, CatalogError> {
        if let Some(warm) = self.warm_releases.get() {
            if let Some(release) = warm.get(release_id) {
                return Ok(release.clone());
            }
        }
        let url = format!(
            "{}/release/{}?inc=release-groups&fmt=json",
            self.base_url, release_id
        );
        self.cache
            .get_cached(ENTITY_RELEASE, release_id, self.windows.release, || {
                self.get_json(&url)
            })
            .await
    }
}

#[async_trait]
impl CatalogLibrary for MusicBrainzLibrary {
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
        let groups = self.release_groups(&artist_id).await?;
        debug!(artist, groups = groups.len(), "browsed release groups");

        let mut releases = Vec::new();
        for group in groups.iter().filter(|g| adapter::is_tracked(g)) {
            let Some(release_id) = self.canonical_release_id(&group.id).await? else {
                trace!(group = %group.id, "release group has no releases");
                continue;
            };
            let release = self.release(&release_id).await?;
            releases.push(adapter::to_catalog_release(&release, group));
        }
        Ok(releases)
    }
}
