//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\releases-watcher\config.toml
//! - macOS: ~/Library/Application Support/releases-watcher/config.toml
//! - Linux: ~/.config/releases-watcher/config.toml
//!
//! A missing file yields defaults; a file that exists but does not parse is
//! a startup error, since silently syncing with wrong thresholds or into the
//! wrong database would be worse than refusing to run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Local music library settings
    pub library: LibraryConfig,

    /// External catalog settings
    pub catalog: CatalogConfig,

    /// Storage settings
    pub storage: StorageConfig,

    /// Settings/report workbook location
    pub sheet: SheetConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Discogs personal access token
    pub discogs_token: Option<String>,

    /// MusicBrainz bearer token
    pub musicbrainz_token: Option<String>,
}

/// Local library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of the music collection to scan
    pub root: PathBuf,

    /// One subtree under the root to skip entirely
    pub excluded_path: Option<PathBuf>,

    /// Number of concurrent tag readers
    pub workers: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            excluded_path: None,
            workers: 10,
        }
    }
}

/// External catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog provider: "musicbrainz" or "discogs"
    pub provider: String,

    /// Outbound API request limit, requests per minute
    pub rate_per_minute: u32,

    /// Actual albums released strictly before this year are ignored
    pub cutoff_year: i32,

    /// Freshness window for cached artist searches, in days
    pub artist_search_freshness_days: u64,

    /// Freshness window for cached release/browse pages, in days
    pub release_freshness_days: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            provider: "musicbrainz".to_string(),
            rate_per_minute: 50,
            cutoff_year: 2010,
            artist_search_freshness_days: 90,
            release_freshness_days: 10,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("releases_watcher.db"),
        }
    }
}

/// Settings/report workbook location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Directory holding settings.csv and releases.csv
    pub dir: PathBuf,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sheet"),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("releases-watcher"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk.
///
/// Returns defaults if no file exists. A file that cannot be read or
/// parsed is an error.
pub fn load() -> Result<Config, ConfigError> {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Ok(Config::default());
    };
    load_from(&path)
}

/// Load configuration from a specific path.
pub fn load_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config =
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to disk.
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
