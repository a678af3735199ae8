//! Directory scanning for mp3 files
//!
//! [`scan_mp3s`] walks a tree and yields mp3 paths. [`scan_to_db`] reads the
//! tags of each one and stores them in the catalog.

use crate::db::{Catalog, TrackRecord};
use crate::tags::{read_tags, TrackTags};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome counts of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub stored: usize,
    pub failed: usize,
}

/// True for files ending in `.mp3`, any case
pub fn is_mp3(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Every mp3 file below `root`. Unreadable entries are skipped.
pub fn scan_mp3s(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_mp3(entry.path()))
        .map(|entry| entry.into_path())
}

/// Tags of `path` with empty fields rectified. Unreadable tags are logged
/// and treated as empty.
pub fn track_record(path: &Path) -> TrackRecord {
    let mut tags = read_tags(path).unwrap_or_else(|e| {
        debug!("No tags read: {}", e);
        TrackTags::default()
    });
    tags.rectify();

    TrackRecord {
        path: path.to_string_lossy().replace("//", "/"),
        artist: tags.artist,
        album: tags.album,
        title: tags.title,
        tracknum: tags.tracknum,
    }
}

/// Scan `root` and upsert every mp3 found into `catalog`.
///
/// `progress` is called once per file with the record and the storage error,
/// if any. Fails only when `root` itself is not a readable directory.
pub async fn scan_to_db<F>(root: &Path, catalog: &Catalog, mut progress: F) -> Result<ScanCounts>
where
    F: FnMut(&TrackRecord, Option<&Error>),
{
    if !root.is_dir() {
        return Err(Error::NotADirectory(root.to_path_buf()));
    }

    let mut counts = ScanCounts::default();
    for path in scan_mp3s(root) {
        let record = tokio::task::spawn_blocking(move || track_record(&path)).await?;

        match catalog.upsert(&record).await {
            Ok(()) => {
                counts.stored += 1;
                progress(&record, None);
            }
            Err(e) => {
                warn!("Storing {} failed: {}", record.path, e);
                counts.failed += 1;
                progress(&record, Some(&e));
            }
        }
    }

    debug!(
        "Scan of {} done: {} stored, {} failed",
        root.display(),
        counts.stored,
        counts.failed
    );
    Ok(counts)
}
