//! Conversions from MusicBrainz wire types to catalog releases.

use crate::catalog::domain::CatalogRelease;
use crate::model::Kind;

use super::dto;

/// Secondary types that mark a release group as something other than a
/// studio release.
const EXCLUDED_SECONDARY_TYPES: &[&str] = &[
    "Compilation",
    "Soundtrack",
    "Live",
    "Remix",
    "Demo",
    "Mixtape/Street",
    "Bootleg",
    "Interview",
    "Audiobook",
];

/// Whether a release group represents an official studio release worth
/// tracking: a known primary type with no disqualifying secondary type.
pub fn is_tracked(group: &dto::ReleaseGroup) -> bool {
    let kind = group
        .primary_type
        .as_deref()
        .map(Kind::parse)
        .unwrap_or(Kind::Unknown);
    if kind == Kind::Unknown {
        return false;
    }
    !group
        .secondary_types
        .iter()
        .any(|t| EXCLUDED_SECONDARY_TYPES.iter().any(|e| e.eq_ignore_ascii_case(t)))
}

/// A release paired with the group it was resolved through.
pub fn to_catalog_release(release: &dto::Release, group: &dto::ReleaseGroup) -> CatalogRelease {
    let kind = group
        .primary_type
        .as_deref()
        .map(Kind::parse)
        .unwrap_or(Kind::Unknown);
    let year = release
        .date
        .as_deref()
        .or(group.first_release_date.as_deref())
        .and_then(parse_year);
    CatalogRelease {
        id: release.id.clone(),
        title: release.title.clone(),
        year,
        kind,
        url: format!("https://musicbrainz.org/release/{}", release.id),
    }
}

/// MusicBrainz dates are `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
fn parse_year(date: &str) -> Option<i32> {
    let year = date.split('-').next()?;
    year.parse().ok().filter(|y| *y > 0)
}
