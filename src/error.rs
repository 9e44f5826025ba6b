use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::search::SearchPhase;

#[derive(Error, Debug)]
pub enum LogSearchError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid time window: start {start_ms} is after end {end_ms}")]
    InvalidWindow { start_ms: i64, end_ms: i64 },

    #[error("Invalid timestamp '{0}', expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp(String),

    #[error("Invalid folder '{0}': must be relative to the base directory")]
    InvalidFolder(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to list folder '{folder}': {source}")]
    FolderResolution {
        folder: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to process file '{path}': {source}")]
    FileProcessing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File set changed during search ({phase}): {added} added, {removed} removed")]
    FileSetChanged {
        phase: SearchPhase,
        added: usize,
        removed: usize,
    },

    #[error("Search cancelled during {phase}")]
    Cancelled { phase: SearchPhase },

    #[error("An unexpected error occurred: {0}")]
    Other(String),
}

impl LogSearchError {
    /// Errors caused by the request itself rather than by the filesystem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LogSearchError::InvalidPattern { .. }
                | LogSearchError::InvalidWindow { .. }
                | LogSearchError::InvalidTimestamp(_)
                | LogSearchError::InvalidFolder(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LogSearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(LogSearchError::InvalidTimestamp("yesterday".into()).is_client_error());
        assert!(LogSearchError::InvalidWindow {
            start_ms: 10,
            end_ms: 1
        }
        .is_client_error());
        assert!(!LogSearchError::FileSetChanged {
            phase: SearchPhase::ResolvingRecheck,
            added: 1,
            removed: 0
        }
        .is_client_error());
        assert!(!LogSearchError::FileProcessing {
            path: "app.log".into(),
            source: io::Error::other("boom")
        }
        .is_client_error());
    }

    #[test]
    fn test_error_messages() {
        let err = LogSearchError::FileSetChanged {
            phase: SearchPhase::ResolvingRecheck,
            added: 2,
            removed: 1,
        };
        assert_eq!(
            err.to_string(),
            "File set changed during search (resolving-recheck): 2 added, 1 removed"
        );

        let err = LogSearchError::InvalidFolder("../etc".into());
        assert_eq!(
            err.to_string(),
            "Invalid folder '../etc': must be relative to the base directory"
        );
    }
}
