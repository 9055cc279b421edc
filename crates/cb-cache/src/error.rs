use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced while building or reading the LMDB cache.
///
/// On the read path these are almost always swallowed: a cache that cannot
/// be opened or validated simply routes the query to scan.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database missing: {0}")]
    MissingDatabase(&'static str),

    #[error("cache metadata missing")]
    MissingMeta,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Lmdb(#[from] heed::Error),

    #[error(transparent)]
    Runner(#[from] cb_runner::RunnerError),

    #[error(transparent)]
    Snapshot(#[from] cb_snapshot::SnapshotError),

    #[error(transparent)]
    Output(#[from] cb_output::OutputError),

    #[error(transparent)]
    Query(#[from] cb_query::QueryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
