//! Filesystem scanner for the local music collection.
//!
//! Walks a directory tree and emits the audio files whose tags feed the
//! local library sync. One configured subtree can be excluded; the walk
//! prunes it entirely instead of filtering file-by-file.

use futures::stream::Stream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Extensions the collection is expected to contain.
const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "m4a"];

/// How many paths the walker may run ahead of the consumer.
const CHANNEL_CAPACITY: usize = 100;

/// Whether a path names an audio file we scan (by extension, case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Scans the given root directory recursively for audio files.
///
/// `excluded_path` names one subtree to skip entirely. `counter` is bumped
/// once per emitted file, for progress reporting. The stream ends when the
/// walk completes, the token is cancelled, or the consumer is dropped; the
/// scanner is the sole producer and closes the stream itself.
pub fn scan(
    root: PathBuf,
    excluded_path: Option<PathBuf>,
    counter: Arc<AtomicUsize>,
    cancel: CancellationToken,
) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            // Pruning here skips the excluded directory's whole subtree
            match &excluded_path {
                Some(excluded) => entry.path() != excluded.as_path(),
                None => true,
            }
        });

        for entry in walker.filter_map(|e| e.ok()) {
            if cancel.is_cancelled() {
                tracing::info!("Scan cancelled");
                break;
            }
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                // If the receiver is dropped, blocking_send errors and we
                // stop scanning rather than leak writes to a closed stream.
                if tx.blocking_send(entry.path().to_path_buf()).is_err() {
                    break;
                }
                // Count only after the send lands, so the progress figure
                // never exceeds the number of emitted files.
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}
