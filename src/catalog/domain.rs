//! Catalog-side domain types shared by both backends.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use thiserror::Error;

use crate::cache::CacheError;
use crate::model::Kind;

/// A release as resolved from an external catalog, before it is stored
/// in the actual library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRelease {
    /// Backend-native identifier (MBID or Discogs numeric id as text).
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub kind: Kind,
    /// Human-facing page for the release on the backend's site.
    pub url: String,
}

/// How long cached catalog answers stay valid.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessWindows {
    /// Artist name -> id resolutions. These move slowly, so the window
    /// is long.
    pub artist_search: Duration,
    /// Release listings per artist and individual release lookups. Kept
    /// short so new releases surface within days, not months.
    pub release: Duration,
}

impl FreshnessWindows {
    pub fn from_days(artist_search_days: u64, release_days: u64) -> Self {
        const DAY: u64 = 24 * 60 * 60;
        Self {
            artist_search: Duration::from_secs(artist_search_days * DAY),
            release: Duration::from_secs(release_days * DAY),
        }
    }
}

/// Errors surfaced by catalog backends.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse catalog response: {0}")]
    Parse(String),

    #[error("artist {0:?} not found in the catalog")]
    ArtistNotFound(String),

    #[error("catalog rate limit exceeded")]
    RateLimited,

    #[error("catalog API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl CatalogError {
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return CatalogError::RateLimited;
            }
            return CatalogError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            CatalogError::Parse(err.to_string())
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}

pub(crate) type ApiLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Token bucket that paces requests evenly across the minute. The burst
/// of one keeps backends from seeing request spikes after idle periods.
pub(crate) fn request_limiter(per_minute: u32) -> ApiLimiter {
    let per_minute = NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);
    RateLimiter::direct(quota)
}
