use cb_types::ShardId;
use thiserror::Error;

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors produced while scaffolding or executing batches.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("batch already exists: {0}")]
    BatchExists(String),

    #[error("task not found: {batch_id}/{task_id}")]
    TaskNotFound { batch_id: String, task_id: String },

    #[error("task {task_id} shard {shard_id}: dependencies not done: {incomplete:?}")]
    DepsUnsatisfied {
        task_id: String,
        shard_id: ShardId,
        incomplete: Vec<String>,
    },

    #[error("shard {shard_id} of {task_id} is {status}; cannot {action}")]
    InvalidTransition {
        task_id: String,
        shard_id: ShardId,
        status: String,
        action: &'static str,
    },

    #[error("store is locked by another writer")]
    StoreLocked,

    #[error("run cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Snapshot(#[from] cb_snapshot::SnapshotError),

    #[error(transparent)]
    Plan(#[from] cb_plan::PlanError),

    #[error(transparent)]
    Output(#[from] cb_output::OutputError),

    #[error(transparent)]
    Store(#[from] cb_store::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
