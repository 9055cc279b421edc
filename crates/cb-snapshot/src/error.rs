use std::path::PathBuf;

use thiserror::Error;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors produced while building or reading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("source is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("path collision: {} and {} share key {key}", .paths.0, .paths.1)]
    PathCollision { key: String, paths: (String, String) },

    #[error("symlink loop at {0}")]
    WalkLoop(PathBuf),

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Path(#[from] cb_types::TypeError),

    #[error(transparent)]
    Store(#[from] cb_store::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
