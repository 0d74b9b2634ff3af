//! Core data models for the release watcher.
//!
//! Defines the primary entities: [`LocalAlbum`], [`ActualAlbum`], [`Kind`],
//! and the per-artist [`NotificationSetting`]. Persisted types derive from
//! SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `local_album` - (artist, name) pairs read from file tags, per version
//! - `actual_album` - catalog releases for tracked artists, per version
//! - `excluded_album` / `excluded_artist` - static deny lists

use sqlx::FromRow;

/// An album derived from tags on files physically present in the collection.
///
/// Identity is the raw trimmed (artist, name) pair within one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, FromRow)]
pub struct LocalAlbum {
    pub artist: String,
    pub name: String,
    pub version_id: i64,
}

/// A release known to the external catalog for a tracked artist.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ActualAlbum {
    /// Catalog release id (MusicBrainz MBID or Discogs numeric id as text)
    pub id: String,
    pub artist: String,
    pub name: String,
    /// Release year, when the catalog provides one
    pub year: Option<i32>,
    /// Release category as stored ("Album", "EP", "Single", "Unknown")
    pub kind: String,
    /// Link to the release page on the catalog
    pub url: Option<String>,
    pub version_id: i64,
}

impl ActualAlbum {
    /// Parse the stored kind string leniently.
    ///
    /// Unrecognized values map to [`Kind::Unknown`]; the caller decides
    /// whether that is worth a warning.
    pub fn kind(&self) -> Kind {
        Kind::parse(&self.kind)
    }
}

/// Release category assigned from catalog format/type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    #[default]
    Unknown,
    Album,
    Ep,
    Single,
}

impl Kind {
    /// Case-insensitive parse; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Kind {
        match s.trim().to_ascii_lowercase().as_str() {
            "album" => Kind::Album,
            "ep" => Kind::Ep,
            "single" => Kind::Single,
            _ => Kind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Unknown => "Unknown",
            Kind::Album => "Album",
            Kind::Ep => "EP",
            Kind::Single => "Single",
        }
    }

    /// True for the stored kind strings we recognize.
    pub fn is_known(s: &str) -> bool {
        !matches!(Kind::parse(s), Kind::Unknown) || s.trim().eq_ignore_ascii_case("unknown")
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-artist policy controlling which release kinds should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationSetting {
    #[default]
    AllReleases,
    AlbumsAndEp,
    AlbumsOnly,
    DoNotTrack,
}

impl NotificationSetting {
    /// Parse a settings cell. Blank means the default ("All releases").
    pub fn parse(raw: &str) -> Result<NotificationSetting, UnknownNotification> {
        match raw.trim() {
            "" | "All releases" => Ok(NotificationSetting::AllReleases),
            "Albums and EP" => Ok(NotificationSetting::AlbumsAndEp),
            "Albums" => Ok(NotificationSetting::AlbumsOnly),
            "Do not track" => Ok(NotificationSetting::DoNotTrack),
            other => Err(UnknownNotification(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSetting::AllReleases => "All releases",
            NotificationSetting::AlbumsAndEp => "Albums and EP",
            NotificationSetting::AlbumsOnly => "Albums",
            NotificationSetting::DoNotTrack => "Do not track",
        }
    }

    /// Whether a release of the given kind is in scope for this setting.
    pub fn is_in_scope(&self, kind: Kind) -> bool {
        match self {
            NotificationSetting::AllReleases => true,
            NotificationSetting::AlbumsAndEp => matches!(kind, Kind::Album | Kind::Ep),
            NotificationSetting::AlbumsOnly => matches!(kind, Kind::Album),
            NotificationSetting::DoNotTrack => false,
        }
    }
}

/// Error for a settings cell that names no known notification policy.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown notification value {0:?}")]
pub struct UnknownNotification(pub String);

/// One row of the settings collaborator: artist plus notification policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistSetting {
    pub artist_name: String,
    pub notification: NotificationSetting,
}

/// A static deny-list entry for a whole album.
#[derive(Debug, Clone, FromRow)]
pub struct ExcludedAlbum {
    pub artist: String,
    pub album: String,
}

/// One row of the local/actual correspondence table.
///
/// At least one side is always present.
#[derive(Debug, Clone, Default)]
pub struct MatchedAlbum {
    pub local: Option<LocalAlbum>,
    pub actual: Option<ActualAlbum>,
}

impl MatchedAlbum {
    /// Human-readable collection status for reporting.
    pub fn status(&self) -> &'static str {
        match (self.actual.is_some(), self.local.is_some()) {
            (true, true) => "In collection",
            (true, false) => "New",
            (false, true) => "Not found",
            (false, false) => "Error",
        }
    }
}
