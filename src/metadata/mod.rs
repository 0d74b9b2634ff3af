//! Audio file tag reading.
//!
//! Uses the lofty crate for format-independent metadata access. Only the
//! artist/album identity matters here; everything else in the tag is
//! ignored. Failures are the caller's problem to log and skip, there are
//! no retries.

use anyhow::{Context, Result};
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;

/// The (artist, album) identity read from one file's tags.
///
/// Both fields are trimmed; either may be empty when the tag is present
/// but blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumTag {
    pub artist: String,
    pub album: String,
}

impl AlbumTag {
    /// A tag is correct when both identity fields are non-empty.
    ///
    /// Incorrect tags are still stored; the flag only drives a warning.
    pub fn is_correct(&self) -> bool {
        !self.artist.is_empty() && !self.album.is_empty()
    }
}

/// Read the artist/album pair from an audio file.
///
/// Fails when the file cannot be opened or its tag container cannot be
/// decoded. Missing fields come back as empty strings rather than errors.
pub fn read_album(path: &Path) -> Result<AlbumTag> {
    let tagged_file = Probe::open(path)
        .context("Failed to open file for probing")?
        .read()
        .context("Failed to read file metadata")?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let artist = tag
        .and_then(|t| t.artist().map(|s| s.trim().to_string()))
        .unwrap_or_default();

    let album = tag
        .and_then(|t| t.album().map(|s| s.trim().to_string()))
        .unwrap_or_default();

    Ok(AlbumTag { artist, album })
}
