use thiserror::Error;

pub type PlanResult<T> = Result<T, PlanError>;

/// Errors produced by plan validation and executor invocation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task {task} depends on unknown task {dep}")]
    UnknownDep { task: String, dep: String },

    #[error("task {task} depends on {dep}, which is not an earlier entry")]
    ForwardDep { task: String, dep: String },

    #[error("task {task} has unregistered type {task_type:?}")]
    UnknownType { task: String, task_type: String },

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("executor {task_type} failed: {reason}")]
    ExecutorFailed { task_type: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] cb_store::StoreError),

    #[error(transparent)]
    Output(#[from] cb_output::OutputError),
}
