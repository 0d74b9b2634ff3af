//! Classification of Discogs releases into catalog releases.
//!
//! Discogs encodes release type in free-form format descriptions, so
//! classification is by keyword: "Album", "Single", "EP" decide the
//! kind, "Compilation" and a "Soundtrack" style disqualify the release.

use crate::catalog::domain::CatalogRelease;
use crate::model::Kind;

use super::dto;

fn has_description(release: &dto::Release, wanted: &str) -> bool {
    release
        .formats
        .iter()
        .flat_map(|f| f.descriptions.iter())
        .any(|d| d.eq_ignore_ascii_case(wanted))
}

/// The kind a release's format descriptions claim, if any. A release
/// tagged both "Album" and "Single" counts as an album.
fn kind_of(release: &dto::Release) -> Kind {
    if has_description(release, "Album") {
        Kind::Album
    } else if has_description(release, "Single") {
        Kind::Single
    } else if has_description(release, "EP") {
        Kind::Ep
    } else {
        Kind::Unknown
    }
}

/// Whether a release detail belongs in the tracked catalog for the
/// given artist: credited to that artist as the primary act, carries a
/// recognizable kind, and is neither a compilation nor a soundtrack.
pub fn is_tracked(release: &dto::Release, artist_id: i64) -> bool {
    let primary_artist = release.artists.first().map(|a| a.id);
    if primary_artist != Some(artist_id) {
        return false;
    }
    if has_description(release, "Compilation") {
        return false;
    }
    if release.styles.iter().any(|s| s.eq_ignore_ascii_case("Soundtrack")) {
        return false;
    }
    kind_of(release) != Kind::Unknown
}

pub fn to_catalog_release(release: &dto::Release) -> CatalogRelease {
    let url = release
        .uri
        .clone()
        .unwrap_or_else(|| format!("https://www.discogs.com/release/{}", release.id));
    CatalogRelease {
        id: release.id.to_string(),
        title: release.title.clone(),
        // Discogs serves 0 for unknown years.
        year: release.year.filter(|y| *y > 0),
        kind: kind_of(release),
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(descriptions: &[&str], styles: &[&str], artist_id: i64) -> dto::Release {
        dto::Release {
            id: 371333,
            title: "Blackstar".into(),
            year: Some(2016),
            formats: vec![dto::Format {
                name: "Vinyl".into(),
                descriptions: descriptions.iter().map(|d| d.to_string()).collect(),
            }],
            styles: styles.iter().map(|s| s.to_string()).collect(),
            artists: vec![dto::ReleaseArtist {
                id: artist_id,
                name: "David Bowie".into(),
            }],
            uri: None,
        }
    }

    #[test]
    fn album_by_primary_artist_is_tracked() {
        assert!(is_tracked(&release(&["LP", "Album"], &[], 10263), 10263));
    }

    #[test]
    fn other_artists_releases_are_rejected() {
        assert!(!is_tracked(&release(&["Album"], &[], 999), 10263));
    }

    #[test]
    fn compilations_and_soundtracks_are_rejected() {
        assert!(!is_tracked(&release(&["Album", "Compilation"], &[], 10263), 10263));
        assert!(!is_tracked(&release(&["Album"], &["Soundtrack"], 10263), 10263));
    }

    #[test]
    fn unclassifiable_formats_are_rejected() {
        assert!(!is_tracked(&release(&["LP", "Reissue"], &[], 10263), 10263));
        let mut bare = release(&[], &[], 10263);
        bare.formats.clear();
        assert!(!is_tracked(&bare, 10263));
    }

    #[test]
    fn album_outranks_single_and_ep() {
        let r = release(&["Album", "Single", "EP"], &[], 10263);
        assert_eq!(kind_of(&r), Kind::Album);
        assert_eq!(kind_of(&release(&["Single", "EP"], &[], 10263)), Kind::Single);
        assert_eq!(kind_of(&release(&["EP"], &[], 10263)), Kind::Ep);
    }

    #[test]
    fn conversion_normalizes_year_and_url() {
        let mut r = release(&["Album"], &[], 10263);
        r.year = Some(0);
        let converted = to_catalog_release(&r);
        assert_eq!(converted.year, None);
        assert_eq!(converted.url, "https://www.discogs.com/release/371333");
        assert_eq!(converted.id, "371333");
    }
}
