//! Freshness-aware cache for external catalog responses.
//!
//! Values are JSON-serialized and keyed by (entity kind, id) in the `cache`
//! table. A lookup within the freshness window returns the stored value
//! verbatim; a miss or stale entry invokes the supplied fetcher and stores
//! the result before returning it. Staleness is tolerated by design: it
//! bounds the number of API calls a sync run can issue.
//!
//! Concurrency contract: last write wins per key. Two concurrent fetchers
//! for the same key may both call out and both store; that is acceptable
//! because a catalog response for a fixed id is expected to be stable.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;

/// Freshness cache over the shared SQLite pool.
#[derive(Clone)]
pub struct Cache {
    pool: SqlitePool,
}

/// Errors from cache storage or value (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Cache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up (entity, id); on miss or staleness run `fetch`, store its
    /// result, and return it. Fetch failures propagate without touching
    /// the stored entry.
    pub async fn get_cached<T, E, F, Fut>(
        &self,
        entity: &str,
        id: &str,
        max_age: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(bytes) = self.get_fresh(entity, id, max_age).await.map_err(E::from)? {
            let value = serde_json::from_slice(&bytes).map_err(|e| E::from(CacheError::from(e)))?;
            return Ok(value);
        }

        let value = fetch().await?;
        let bytes = serde_json::to_vec(&value).map_err(|e| E::from(CacheError::from(e)))?;
        self.insert(entity, id, &bytes).await.map_err(E::from)?;
        Ok(value)
    }

    /// Return every still-fresh entry of a kind as an id-to-value map.
    ///
    /// Used to pre-warm an in-memory lookup before issuing network calls,
    /// avoiding one cache round trip per already-known release.
    pub async fn get_all_entities<T>(
        &self,
        entity: &str,
        max_age: Duration,
    ) -> Result<HashMap<String, T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT id, value FROM cache WHERE entity = ? AND ts > ?")
                .bind(entity)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;

        let mut result = HashMap::with_capacity(rows.len());
        for (id, bytes) in rows {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    result.insert(id, value);
                }
                Err(e) => {
                    // A single undecodable row should not poison the warm-up
                    tracing::warn!(entity, id, error = %e, "Skipping undecodable cache entry");
                }
            }
        }
        Ok(result)
    }

    /// Store a value directly, stamping it with the current time.
    pub async fn put<T: Serialize>(&self, entity: &str, id: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.insert(entity, id, &bytes).await
    }

    /// Rewind a stored entry's timestamp by `age`, to simulate aging.
    #[cfg(test)]
    pub(crate) async fn backdate(
        &self,
        entity: &str,
        id: &str,
        age: Duration,
    ) -> Result<(), CacheError> {
        sqlx::query("UPDATE cache SET ts = ? WHERE entity = ? AND id = ?")
            .bind(Utc::now().timestamp() - age.as_secs() as i64)
            .bind(entity)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_fresh(
        &self,
        entity: &str,
        id: &str,
        max_age: Duration,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM cache WHERE entity = ? AND id = ? AND ts > ?")
                .bind(entity)
                .bind(id)
                .bind(cutoff)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn insert(&self, entity: &str, id: &str, value: &[u8]) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT OR REPLACE INTO cache (entity, id, value, ts) VALUES (?, ?, ?, ?)",
        )
        .bind(entity)
        .bind(id)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
