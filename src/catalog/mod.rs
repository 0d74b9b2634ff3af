//! Release catalog backends.
//!
//! A catalog resolves an artist name to the set of official studio
//! releases the artist has published. Two backends are provided,
//! MusicBrainz and Discogs, behind the [`CatalogLibrary`] trait so the
//! sync layer never cares which one is configured. Both clients pace
//! their requests with a token bucket and route every remote call
//! through the freshness cache.

pub mod discogs;
pub mod domain;
pub mod musicbrainz;
pub mod traits;

pub use discogs::DiscogsLibrary;
pub use domain::{CatalogError, CatalogRelease, FreshnessWindows};
pub use musicbrainz::MusicBrainzLibrary;
pub use traits::CatalogLibrary;
