use cb_types::OutputKind;
use thiserror::Error;

pub type OutputResult<T> = Result<T, OutputError>;

/// Errors produced by output-record and chunking operations.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("record of kind {kind} is missing required field {field:?}")]
    MissingField { kind: OutputKind, field: &'static str },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] cb_store::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
