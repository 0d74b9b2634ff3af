//! Wire types for the MusicBrainz JSON API (v2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSearchResponse {
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseGroupBrowseResponse {
    #[serde(rename = "release-group-count", default)]
    pub count: i64,
    #[serde(rename = "release-group-offset", default)]
    pub offset: i64,
    #[serde(rename = "release-groups", default)]
    pub release_groups: Vec<ReleaseGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    #[serde(rename = "primary-type", default)]
    pub primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    pub secondary_types: Vec<String>,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: Option<String>,
    /// Present only on `inc=releases` lookups.
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    /// Present only on `inc=release-groups` lookups.
    #[serde(rename = "release-group", default)]
    pub release_group: Option<ReleaseGroup>,
}
