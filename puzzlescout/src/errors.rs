use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for index and query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while indexing shards or running a query.
///
/// Malformed rows and malformed shard boundaries are never errors; they
/// degrade to documented defaults. What remains here is the failure of a
/// single query to read its shards, which the caller reports as a
/// server-side failure without affecting other in-flight queries.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Shard not found: {0}")]
    ShardNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Shard directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Query cancelled")]
    Cancelled,
    #[error("Engine not initialized")]
    NotInitialized,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in shard {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
}

impl QueryError {
    pub fn shard_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ShardNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound(path.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O error on `path` to the path-carrying variant for its kind
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::shard_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}
