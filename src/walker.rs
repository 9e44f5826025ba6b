use crate::error::{LogSearchError, Result};
use crate::search::LogFile;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// An entry below the root that could not be listed or stat'ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Every regular file under one folder, as seen by a single walk.
#[derive(Debug, Default)]
pub struct FolderListing {
    pub root: PathBuf,
    pub files: Vec<LogFile>,
    pub failures: Vec<WalkFailure>,
}

/// Recursively list the regular files under `folder` with their mtimes.
///
/// Symlinks are not followed and neither they nor special files are listed.
/// The root is canonicalized, so listed paths are absolute. Failing to open
/// the root is an error; failures further down are collected in the listing.
/// A cancelled walk stops early and returns what it has seen so far.
pub fn list_files(folder: &Path, cancel: &CancellationToken) -> Result<FolderListing> {
    let root_error = |source: io::Error| LogSearchError::FolderResolution {
        folder: folder.to_path_buf(),
        source,
    };

    let root = fs::canonicalize(folder).map_err(root_error)?;
    if !fs::metadata(&root).map_err(root_error)?.is_dir() {
        return Err(root_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut listing = FolderListing {
        root: root.clone(),
        ..Default::default()
    };

    for entry in WalkDir::new(&root).follow_links(false).min_depth(1) {
        if cancel.is_cancelled() {
            debug!("Walk of {} cancelled", root.display());
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(root_error(io::Error::from(e))),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                listing.failures.push(WalkFailure {
                    path: e.path().map(Path::to_path_buf),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
            Ok(modified) => listing
                .files
                .push(LogFile::new(entry.into_path(), epoch_ms(modified))),
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                listing.failures.push(WalkFailure {
                    path: Some(entry.into_path()),
                    message: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Listed {} files under {} ({} failures)",
        listing.files.len(),
        root.display(),
        listing.failures.len()
    );
    Ok(listing)
}

pub(crate) fn epoch_ms(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
    }
}
