//! Schema constants shared by every persisted record.
//!
//! All JSON and JSONL artifacts carry `schema_name` and `schema_version`.
//! The version bumps on any breaking field change; readers tolerate unknown
//! fields and writers emit only registered fields.

use serde::{Deserialize, Serialize};

/// Current schema version for all record types.
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_STORE: &str = "codebatch.store";
pub const SCHEMA_SNAPSHOT: &str = "codebatch.snapshot";
pub const SCHEMA_FILE_ENTRY: &str = "codebatch.file";
pub const SCHEMA_BATCH: &str = "codebatch.batch";
pub const SCHEMA_PLAN: &str = "codebatch.plan";
pub const SCHEMA_TASK: &str = "codebatch.task";
pub const SCHEMA_SHARD_STATE: &str = "codebatch.shard_state";
pub const SCHEMA_OUTPUT: &str = "codebatch.output";
pub const SCHEMA_EVENT: &str = "codebatch.event";
pub const SCHEMA_CHUNKS: &str = "codebatch.chunks";
pub const SCHEMA_CACHE_META: &str = "codebatch.cache_meta";

/// Identifies the implementation that wrote a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
}

impl Producer {
    pub fn current() -> Self {
        Self {
            name: "codebatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
