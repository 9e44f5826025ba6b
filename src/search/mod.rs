//! Time-windowed search across rotated log files
pub mod algorithms;
pub mod engine;
pub mod resolver;
pub mod selector;
pub mod streaming;

use crate::error::{LogSearchError, Result};
use crate::timestamp::TimestampCodec;
use std::fmt;
use std::path::PathBuf;

pub use algorithms::{MatchMode, SearchCriteria};
pub use engine::{FileFailure, SearchCoordinator, SearchOutcome};
pub use resolver::{FolderFailure, FolderResolver, Resolution, ResolveFiles};
pub use selector::{SlackPolicy, select_files};
pub use streaming::{Compression, StreamSearcher};

/// One file seen by the directory walk, with the mtime observed at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub modified_ms: i64,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>, modified_ms: i64) -> Self {
        Self {
            path: path.into(),
            modified_ms,
        }
    }
}

/// Inclusive interval in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start_ms: i64,
    end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self> {
        if start_ms > end_ms {
            return Err(LogSearchError::InvalidWindow { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    /// Build a window from two line-format timestamps.
    ///
    /// Both bounds have second precision, so the end is stretched to the last
    /// millisecond of its second.
    pub fn from_bounds(codec: &TimestampCodec, start: &str, end: &str) -> Result<Self> {
        let start_ms = codec.parse_bound(start)?;
        let end_ms = codec.parse_bound(end)?;
        Self::new(start_ms, end_ms.saturating_add(999))
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn contains(&self, epoch_ms: i64) -> bool {
        self.start_ms <= epoch_ms && epoch_ms <= self.end_ms
    }
}

/// Where a request is in its resolve/search/recheck cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    ResolvingInitial,
    Searching,
    ResolvingRecheck,
    Retrying,
    ResolvingFinal,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPhase::ResolvingInitial => write!(f, "resolving-initial"),
            SearchPhase::Searching => write!(f, "searching"),
            SearchPhase::ResolvingRecheck => write!(f, "resolving-recheck"),
            SearchPhase::Retrying => write!(f, "retrying"),
            SearchPhase::ResolvingFinal => write!(f, "resolving-final"),
        }
    }
}
