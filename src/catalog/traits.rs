use async_trait::async_trait;

use super::domain::{CatalogError, CatalogRelease};

/// A source of release listings for artists.
#[async_trait]
pub trait CatalogLibrary: Send + Sync {
    /// Bulk-load cached release details before a run. Optional; a
    /// backend that does not pre-warm returns Ok immediately.
    async fn warm(&self) -> Result<(), CatalogError>;

    /// Resolve an artist name to its tracked releases. Returns
    /// [`CatalogError::ArtistNotFound`] when the name matches nothing.
    async fn releases_for_artist(&self, artist: &str) -> Result<Vec<CatalogRelease>, CatalogError>;
}
