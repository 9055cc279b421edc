use thiserror::Error;

pub type DiffResult<T> = Result<T, DiffError>;

/// Errors produced while comparing batches.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Cache(#[from] cb_cache::CacheError),

    #[error(transparent)]
    Query(#[from] cb_query::QueryError),
}
