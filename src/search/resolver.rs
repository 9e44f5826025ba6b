//! Candidate file resolution across several folders
use super::selector::{SlackPolicy, select_files};
use super::TimeWindow;
use crate::error::{LogSearchError, Result};
use crate::walker::{WalkFailure, list_files};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// A requested folder whose root could not be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFailure {
    pub folder: PathBuf,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl FolderFailure {
    pub fn into_error(self) -> LogSearchError {
        LogSearchError::FolderResolution {
            source: io::Error::new(self.kind, self.message),
            folder: self.folder,
        }
    }
}

/// The candidate file set for one request, plus what went wrong producing it.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Absolute paths, deduplicated and sorted.
    pub files: Vec<PathBuf>,
    pub failed_folders: Vec<FolderFailure>,
    pub walk_failures: Vec<WalkFailure>,
}

/// Produces the candidate file set for a list of folders and a window.
#[async_trait]
pub trait ResolveFiles: Send + Sync {
    async fn resolve(
        &self,
        folders: &[PathBuf],
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Resolution>;
}

/// Walks each folder on the blocking pool and keeps the window's candidates.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    slack: SlackPolicy,
    max_concurrent: usize,
}

impl Default for FolderResolver {
    fn default() -> Self {
        Self::new(SlackPolicy::default(), 8)
    }
}

impl FolderResolver {
    pub fn new(slack: SlackPolicy, max_concurrent: usize) -> Self {
        Self {
            slack,
            max_concurrent: max_concurrent.max(1),
        }
    }
}

#[async_trait]
impl ResolveFiles for FolderResolver {
    async fn resolve(
        &self,
        folders: &[PathBuf],
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let lookups = folders.iter().map(|folder| {
            let semaphore = semaphore.clone();
            let folder = folder.clone();
            let cancel = cancel.clone();
            let slack = self.slack;
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| LogSearchError::Other(e.to_string()))?;
                tokio::task::spawn_blocking(move || {
                    let listing = list_files(&folder, &cancel)?;
                    let selected = select_files(listing.files, window, slack);
                    Ok::<_, LogSearchError>((selected, listing.failures))
                })
                .await
                .map_err(|e| LogSearchError::Other(format!("Folder walk task failed: {e}")))?
            }
        });

        let outcomes = join_all(lookups).await;

        let mut files = BTreeSet::new();
        let mut resolution = Resolution::default();
        for (folder, outcome) in folders.iter().zip(outcomes) {
            match outcome {
                Ok((selected, failures)) => {
                    debug!(
                        "{} candidate files in {}",
                        selected.len(),
                        folder.display()
                    );
                    files.extend(selected.into_iter().map(|f| f.path));
                    resolution.walk_failures.extend(failures);
                }
                Err(LogSearchError::FolderResolution { folder, source }) => {
                    warn!("Cannot list folder {}: {}", folder.display(), source);
                    resolution.failed_folders.push(FolderFailure {
                        folder,
                        kind: source.kind(),
                        message: source.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        resolution.files = files.into_iter().collect();
        Ok(resolution)
    }
}
