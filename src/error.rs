//! Application-wide error types.
//!
//! Library modules carry specific error types via `thiserror` (see
//! `catalog::CatalogError`, `cache::CacheError`, `sheet::SheetError`,
//! `config::ConfigError`); the orchestration layer aggregates the ones
//! that cross it here, and CLI/main uses `anyhow` for propagation.
//! Per-item failures (one file, one artist) are logged and skipped by
//! their callers and never reach this type.

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by sync and diff orchestration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Catalog resolution error fatal to the whole run
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("Database error"));
    }

    #[test]
    fn test_catalog_error_display() {
        let err = Error::from(crate::catalog::CatalogError::ArtistNotFound("Queen".into()));
        assert!(err.to_string().contains("Queen"));
    }
}
