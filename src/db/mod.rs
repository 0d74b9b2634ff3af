//! Database module for versioned album storage.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. Both album
//! streams (local and actual) are versioned: a sync run creates an
//! unpublished write version, fills it, then publishes it with a single
//! flag flip. Readers only ever see the highest published version, so a
//! crashed or cancelled sync never leaks a half-written snapshot.

use crate::model::{ActualAlbum, ExcludedAlbum, LocalAlbum};
use chrono::Utc;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "releases_watcher.db";

/// The two versioned album streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Local,
    Actual,
}

impl Stream {
    fn version_table(&self) -> &'static str {
        match self {
            Stream::Local => "local_version",
            Stream::Actual => "actual_version",
        }
    }
}

/// Build a SQLite database URL from an optional path.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Create a new unpublished write version for a stream.
///
/// Returns the fresh version id. Albums inserted under it stay invisible
/// to readers until [`publish_version`] flips the flag.
pub async fn create_version(pool: &SqlitePool, stream: Stream) -> sqlx::Result<i64> {
    let sql = format!(
        "INSERT INTO {} (published, created_at) VALUES (0, ?)",
        stream.version_table()
    );
    let result = sqlx::query(&sql)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Publish a write version, making it the latest visible snapshot.
pub async fn publish_version(pool: &SqlitePool, stream: Stream, version_id: i64) -> sqlx::Result<()> {
    let sql = format!(
        "UPDATE {} SET published = 1 WHERE version_id = ?",
        stream.version_table()
    );
    sqlx::query(&sql).bind(version_id).execute(pool).await?;
    Ok(())
}

/// Insert a local album into a write version.
///
/// Idempotent per (artist, name, version); re-inserting the same pair is
/// a no-op so a retried run cannot fail on duplicates.
pub async fn insert_local_album(pool: &SqlitePool, album: &LocalAlbum) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO local_album (artist, name, version_id) VALUES (?, ?, ?)",
    )
    .bind(&album.artist)
    .bind(&album.name)
    .bind(album.version_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert an actual (catalog) album into a write version.
pub async fn insert_actual_album(pool: &SqlitePool, album: &ActualAlbum) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO actual_album (id, artist, name, year, kind, url, version_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&album.id)
    .bind(&album.artist)
    .bind(&album.name)
    .bind(album.year)
    .bind(&album.kind)
    .bind(&album.url)
    .bind(album.version_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get all local albums of the latest published local version.
pub async fn get_local_albums(pool: &SqlitePool) -> sqlx::Result<Vec<LocalAlbum>> {
    sqlx::query_as::<_, LocalAlbum>(
        r#"
        SELECT artist, name, version_id FROM local_album
        WHERE version_id = (SELECT MAX(version_id) FROM local_version WHERE published = 1)
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Get all actual albums of the latest published actual version.
pub async fn get_actual_albums(pool: &SqlitePool) -> sqlx::Result<Vec<ActualAlbum>> {
    sqlx::query_as::<_, ActualAlbum>(
        r#"
        SELECT id, artist, name, year, kind, url, version_id FROM actual_album
        WHERE version_id = (SELECT MAX(version_id) FROM actual_version WHERE published = 1)
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Get the distinct artists of the latest published local version.
pub async fn get_local_artists(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT artist FROM local_album
        WHERE version_id = (SELECT MAX(version_id) FROM local_version WHERE published = 1)
        ORDER BY artist
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(a,)| a).collect())
}

/// Get the static excluded-artist deny list.
pub async fn get_excluded_artists(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT artist FROM excluded_artist")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(a,)| a).collect())
}

/// Get the static excluded-album deny list.
pub async fn get_excluded_albums(pool: &SqlitePool) -> sqlx::Result<Vec<ExcludedAlbum>> {
    sqlx::query_as::<_, ExcludedAlbum>("SELECT artist, album FROM excluded_album")
        .fetch_all(pool)
        .await
}
