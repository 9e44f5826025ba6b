//! Core search engine implementation
use super::algorithms::SearchCriteria;
use super::resolver::{FolderFailure, FolderResolver, Resolution, ResolveFiles};
use super::streaming::StreamSearcher;
use super::{SearchPhase, TimeWindow};
use crate::config::{FolderErrorPolicy, SearchConfig};
use crate::error::{LogSearchError, Result};
use crate::metrics::Metrics;
use crate::timestamp::TimestampCodec;
use crate::walker::WalkFailure;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A candidate file whose scan failed; it contributed no lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// The merged, sorted result of one request plus what went wrong along the way.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub lines: Vec<String>,
    pub files_searched: usize,
    pub failed_files: Vec<FileFailure>,
    pub failed_folders: Vec<FolderFailure>,
    pub walk_failures: Vec<WalkFailure>,
    /// The file set changed once and the search was repeated.
    pub retried: bool,
}

#[derive(Default)]
struct Scan {
    lines: Vec<String>,
    failed_files: Vec<FileFailure>,
}

/// Runs resolve, search and recheck for one request at a time.
///
/// A search is only trusted if the candidate file set did not move under it.
/// After scanning, the folders are resolved again; if the set changed, the
/// scan is repeated once and a third resolution must agree with the second.
pub struct SearchCoordinator {
    resolver: Arc<dyn ResolveFiles>,
    searcher: StreamSearcher,
    base_dir: PathBuf,
    max_concurrent_files: usize,
    on_folder_error: FolderErrorPolicy,
    metrics: Arc<Metrics>,
}

impl SearchCoordinator {
    pub fn new(config: &SearchConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let resolver = FolderResolver::new(config.slack(), config.max_concurrent_folders);
        Self::with_resolver(config, Arc::new(resolver), metrics)
    }

    pub fn with_resolver(
        config: &SearchConfig,
        resolver: Arc<dyn ResolveFiles>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let searcher = StreamSearcher::new(TimestampCodec::new(config.zone()?))
            .with_read_timeout(config.read_timeout());
        Ok(Self {
            resolver,
            searcher,
            base_dir: config.base_dir.clone(),
            max_concurrent_files: config.max_concurrent_files.max(1),
            on_folder_error: config.on_folder_error,
            metrics,
        })
    }

    pub fn codec(&self) -> &TimestampCodec {
        self.searcher.codec()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Resolve the candidate files for `folders` without scanning them.
    pub async fn resolve(
        &self,
        folders: &[String],
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let folders = self.folder_paths(folders)?;
        self.snapshot(&folders, window, SearchPhase::ResolvingInitial, cancel)
            .await
    }

    pub async fn execute_search(
        &self,
        folders: &[String],
        window: TimeWindow,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let folders = self.folder_paths(folders)?;
        let started = Instant::now();
        self.metrics.searches.inc();

        let files_a = self
            .snapshot(&folders, window, SearchPhase::ResolvingInitial, cancel)
            .await?;
        let mut scan = self.search_files(&files_a.files, window, criteria, cancel).await?;
        let files_b = self
            .snapshot(&folders, window, SearchPhase::ResolvingRecheck, cancel)
            .await?;

        let mut retried = false;
        let mut last = files_b;
        if files_a.files != last.files {
            let (added, removed) = diff(&files_a.files, &last.files);
            warn!("File set changed during search ({added} added, {removed} removed), retrying");
            self.metrics.consistency_retries.inc();
            debug!("Entering phase {}", SearchPhase::Retrying);

            scan = self.search_files(&files_a.files, window, criteria, cancel).await?;
            let files_c = self
                .snapshot(&folders, window, SearchPhase::ResolvingFinal, cancel)
                .await?;

            if files_c.files != last.files {
                let (added, removed) = diff(&last.files, &files_c.files);
                self.metrics.consistency_failures.inc();
                warn!("File set still changing ({added} added, {removed} removed), giving up");
                return Err(LogSearchError::FileSetChanged {
                    phase: SearchPhase::ResolvingFinal,
                    added,
                    removed,
                });
            }
            last = files_c;
            retried = true;
        }

        scan.lines.sort();
        self.metrics.lines_matched.inc_by(scan.lines.len() as u64);

        info!(
            "Searched {} files in {} folders: {} lines, {} file failures in {:.2?}",
            files_a.files.len(),
            folders.len(),
            scan.lines.len(),
            scan.failed_files.len(),
            started.elapsed()
        );

        Ok(SearchOutcome {
            lines: scan.lines,
            files_searched: files_a.files.len(),
            failed_files: scan.failed_files,
            failed_folders: last.failed_folders,
            walk_failures: last.walk_failures,
            retried,
        })
    }

    /// Join request folder names onto the base directory.
    fn folder_paths(&self, folders: &[String]) -> Result<Vec<PathBuf>> {
        folders
            .iter()
            .map(|name| {
                let relative = Path::new(name);
                let contained = relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
                if !contained {
                    return Err(LogSearchError::InvalidFolder(name.clone()));
                }
                Ok(self.base_dir.join(relative))
            })
            .collect()
    }

    async fn snapshot(
        &self,
        folders: &[PathBuf],
        window: TimeWindow,
        phase: SearchPhase,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        debug!("Entering phase {phase}");
        let mut resolution = self.resolver.resolve(folders, window, cancel).await?;
        if cancel.is_cancelled() {
            return Err(LogSearchError::Cancelled { phase });
        }

        if self.on_folder_error == FolderErrorPolicy::Fail && !resolution.failed_folders.is_empty() {
            return Err(resolution.failed_folders.swap_remove(0).into_error());
        }

        debug!("{phase}: {} candidate files", resolution.files.len());
        Ok(resolution)
    }

    async fn search_files(
        &self,
        files: &[PathBuf],
        window: TimeWindow,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<Scan> {
        debug!("Entering phase {}", SearchPhase::Searching);
        let searcher = &self.searcher;
        let searches: Vec<_> = files
            .iter()
            .map(|path| searcher.search_file(path, window, criteria, cancel))
            .collect();
        let mut results = stream::iter(searches).buffer_unordered(self.max_concurrent_files);

        let mut scan = Scan::default();
        while let Some(result) = results.next().await {
            match result {
                Ok(lines) => scan.lines.extend(lines),
                Err(LogSearchError::FileProcessing { path, source }) => {
                    self.metrics.file_failures.inc();
                    if source.kind() == io::ErrorKind::TimedOut {
                        self.metrics.read_timeouts.inc();
                    }
                    warn!("Skipping {}: {}", path.display(), source);
                    scan.failed_files.push(FileFailure {
                        path,
                        message: source.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.metrics.files_scanned.inc_by(files.len() as u64);
        Ok(scan)
    }
}

/// Count of paths only in `after`, and only in `before`. Both must be sorted.
fn diff(before: &[PathBuf], after: &[PathBuf]) -> (usize, usize) {
    let added = after
        .iter()
        .filter(|p| before.binary_search(p).is_err())
        .count();
    let removed = before
        .iter()
        .filter(|p| after.binary_search(p).is_err())
        .count();
    (added, removed)
}
