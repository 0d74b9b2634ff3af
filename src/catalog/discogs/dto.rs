//! Wire types for the Discogs REST API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistReleasesResponse {
    pub pagination: Pagination,
    #[serde(default)]
    pub releases: Vec<ArtistReleaseRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistReleaseRef {
    pub id: i64,
    /// "master" or "release".
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Set when `entry_type` is "master".
    #[serde(default)]
    pub main_release: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub artists: Vec<ReleaseArtist>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format {
    pub name: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseArtist {
    pub id: i64,
    pub name: String,
}
