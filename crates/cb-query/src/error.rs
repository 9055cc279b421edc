use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors produced by query evaluation.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown stats group: {0}")]
    UnknownStatsGroup(String),

    #[error(transparent)]
    Runner(#[from] cb_runner::RunnerError),

    #[error(transparent)]
    Snapshot(#[from] cb_snapshot::SnapshotError),

    #[error(transparent)]
    Output(#[from] cb_output::OutputError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
