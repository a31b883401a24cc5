//! Error types for queries, watch configuration and refresh passes.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by read queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A query parameter was missing or not recognized.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl QueryError {
    /// Create an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Errors from mutating the watched-directory set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// The directory parameter was empty.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The directory is already watched.
    #[error("{path} already set for analysis")]
    AlreadyWatched { path: String },

    /// The directory was never watched.
    #[error("{path} was not scheduled for analysis")]
    NotWatched { path: String },
}

/// Errors raised by a metadata source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Total capacity could not be determined.
    #[error("Capacity unavailable: {message}")]
    CapacityUnavailable { message: String },

    /// I/O error while reading metadata.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl SourceError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the persistent cache store or the history writer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing persisted state failed.
    #[error("Persistence failure at {path}: {message}")]
    PersistenceFailure { path: PathBuf, message: String },

    /// The store was used before `start` or after `stop`.
    #[error("Cache store is not started")]
    NotStarted,
}

impl StoreError {
    /// Create a persistence failure with path context.
    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Errors that abort a refresh pass. The previously published snapshot is
/// left in place.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Another refresh is already running.
    #[error("A refresh is already in progress")]
    RefreshInProgress,

    /// The pass was cancelled between sub-steps.
    #[error("Refresh cancelled")]
    Cancelled,

    /// Listing entries from the metadata source failed.
    #[error("Metadata source failed: {0}")]
    Source(#[from] SourceError),

    /// Aggregation produced an inconsistent result.
    #[error("Aggregation failed: {message}")]
    Aggregation { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_error_messages() {
        let err = WatchError::AlreadyWatched {
            path: "/data".to_string(),
        };
        assert_eq!(err.to_string(), "/data already set for analysis");

        let err = WatchError::NotWatched {
            path: "/tmp".to_string(),
        };
        assert!(err.to_string().contains("not scheduled"));
    }

    #[test]
    fn test_refresh_error_from_source() {
        let err: RefreshError = SourceError::Other {
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, RefreshError::Source(_)));
    }
}
