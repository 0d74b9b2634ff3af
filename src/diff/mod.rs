//! Normalization and matching between the local and actual libraries.
//!
//! The differ is a pure function of its inputs: the latest published
//! snapshot of each library, per-artist notification settings, and the
//! static exclusion lists. Matching happens on normalized keys so that
//! "Abbey Road [Deluxe Edition]" and "abbey road" compare equal.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db;
use crate::error::Result;
use crate::model::{ActualAlbum, ArtistSetting, Kind, LocalAlbum, MatchedAlbum, NotificationSetting};

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\(\[][^\)\]]*[\)\]]").unwrap_or_else(|e| panic!("{e}")));

/// Canonical matching form of a name: bracketed substrings removed,
/// lowercased, then every character dropped except Unicode letters,
/// ASCII digits and the glyph `★` (artists style themselves with it).
pub fn normalize(s: &str) -> String {
    let stripped = BRACKETED.replace_all(s, "");
    stripped
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_ascii_digit() || *c == '★')
        .collect()
}

/// Normalized (artist, name) pair used for equality across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedKey {
    pub artist: String,
    pub name: String,
}

impl NormalizedKey {
    pub fn new(artist: &str, name: &str) -> Self {
        Self {
            artist: normalize(artist),
            name: normalize(name),
        }
    }
}

/// Computes which catalog albums the collection is missing.
pub struct Differ {
    pool: SqlitePool,
    cutoff_year: i32,
}

impl Differ {
    pub fn new(pool: SqlitePool, cutoff_year: i32) -> Self {
        Self { pool, cutoff_year }
    }

    /// Actual albums absent from the local collection, after exclusion
    /// and notification-scope policy.
    pub async fn diff(&self, settings: &[ArtistSetting]) -> Result<Vec<ActualAlbum>> {
        let inputs = self.load_inputs().await?;
        let policy = Policy::build(&inputs, settings, self.cutoff_year);

        let mut missing = Vec::new();
        for album in inputs.actual {
            let key = NormalizedKey::new(&album.artist, &album.name);
            if inputs.local_keys.contains(&key) {
                continue;
            }
            if policy.keeps(&album, &key) {
                missing.push(album);
            }
        }
        debug!(count = missing.len(), "computed missing albums");
        Ok(missing)
    }

    /// Full correspondence table between the two libraries; one row per
    /// normalized key present on either side. Actual-only rows pass
    /// through the same policy as [`Differ::diff`], rows with a local
    /// side always survive.
    pub async fn matched(&self, settings: &[ArtistSetting]) -> Result<Vec<MatchedAlbum>> {
        let inputs = self.load_inputs().await?;
        let policy = Policy::build(&inputs, settings, self.cutoff_year);

        let mut table: HashMap<NormalizedKey, MatchedAlbum> = HashMap::new();
        for album in inputs.local {
            let key = NormalizedKey::new(&album.artist, &album.name);
            table.entry(key).or_default().local = Some(album);
        }
        for album in inputs.actual {
            let key = NormalizedKey::new(&album.artist, &album.name);
            match table.get_mut(&key) {
                Some(row) => row.actual = Some(album),
                None => {
                    if policy.keeps(&album, &key) {
                        table.insert(
                            key,
                            MatchedAlbum {
                                local: None,
                                actual: Some(album),
                            },
                        );
                    }
                }
            }
        }

        let mut rows: Vec<MatchedAlbum> = table.into_values().collect();
        rows.sort_by(|a, b| row_sort_key(a).cmp(&row_sort_key(b)));
        Ok(rows)
    }

    async fn load_inputs(&self) -> Result<DiffInputs> {
        let local = db::get_local_albums(&self.pool).await?;
        let actual = db::get_actual_albums(&self.pool).await?;
        let excluded_artists = db::get_excluded_artists(&self.pool).await?;
        let excluded_albums = db::get_excluded_albums(&self.pool).await?;

        let local_keys = local
            .iter()
            .map(|a| NormalizedKey::new(&a.artist, &a.name))
            .collect();
        let excluded_album_keys = excluded_albums
            .iter()
            .map(|e| NormalizedKey::new(&e.artist, &e.album))
            .collect();
        let excluded_artist_names = excluded_artists.iter().map(|a| normalize(a)).collect();

        Ok(DiffInputs {
            local,
            actual,
            local_keys,
            excluded_album_keys,
            excluded_artist_names,
        })
    }
}

struct DiffInputs {
    local: Vec<LocalAlbum>,
    actual: Vec<ActualAlbum>,
    local_keys: HashSet<NormalizedKey>,
    excluded_album_keys: HashSet<NormalizedKey>,
    excluded_artist_names: HashSet<String>,
}

/// The keep/drop policy applied to actual albums with no local match.
struct Policy {
    excluded_album_keys: HashSet<NormalizedKey>,
    excluded_artist_names: HashSet<String>,
    settings: HashMap<String, NotificationSetting>,
    cutoff_year: i32,
}

impl Policy {
    fn build(inputs: &DiffInputs, settings: &[ArtistSetting], cutoff_year: i32) -> Self {
        let settings = settings
            .iter()
            .map(|s| (normalize(&s.artist_name), s.notification))
            .collect();
        Self {
            excluded_album_keys: inputs.excluded_album_keys.clone(),
            excluded_artist_names: inputs.excluded_artist_names.clone(),
            settings,
            cutoff_year,
        }
    }

    fn keeps(&self, album: &ActualAlbum, key: &NormalizedKey) -> bool {
        if let Some(year) = album.year {
            if year < self.cutoff_year {
                return false;
            }
        }
        if self.excluded_artist_names.contains(&key.artist) {
            return false;
        }
        if self.excluded_album_keys.contains(key) {
            return false;
        }
        let kind = album.kind();
        if kind == Kind::Unknown && !Kind::is_known(&album.kind) {
            // Kept under the widest scope, but worth surfacing.
            warn!(artist = %album.artist, name = %album.name, kind = %album.kind, "unrecognized release kind");
        }
        match self.settings.get(&key.artist) {
            Some(setting) => setting.is_in_scope(kind),
            None => true,
        }
    }
}

/// Report ordering: artist, then actual-bearing rows by year and name
/// with unknown years first, then local-only rows.
fn row_sort_key(row: &MatchedAlbum) -> (String, u8, i32, String) {
    let artist = row
        .actual
        .as_ref()
        .map(|a| a.artist.as_str())
        .or_else(|| row.local.as_ref().map(|l| l.artist.as_str()))
        .unwrap_or_default()
        .to_lowercase();
    match &row.actual {
        Some(actual) => (
            artist,
            0,
            actual.year.unwrap_or(0),
            actual.name.to_lowercase(),
        ),
        None => (
            artist,
            1,
            i32::MAX,
            row.local
                .as_ref()
                .map(|l| l.name.to_lowercase())
                .unwrap_or_default(),
        ),
    }
}
