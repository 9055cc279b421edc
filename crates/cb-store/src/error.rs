use std::path::PathBuf;

use cb_types::ObjectId;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by store-root and object-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store does not exist: {0}")]
    NotFound(PathBuf),

    #[error("invalid store at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("store already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("object {id} is corrupt: stored bytes hash to {actual}")]
    Corrupt { id: ObjectId, actual: ObjectId },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
