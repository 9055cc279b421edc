use std::fmt;
use std::fs;
use std::path::Path;

use cb_store::fsio;
use cb_types::schema::{SCHEMA_SHARD_STATE, SCHEMA_VERSION};
use cb_types::ShardId;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Shard execution status.
///
/// ```text
/// pending ──start──▶ running ──ok──▶ done
///                       │
///                       ├─err──▶ failed
///                       │
///                       └─reset─▶ pending   (operator action)
/// ```
///
/// `done` and `failed` are terminal until reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Counters recorded when a shard completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub files_processed: usize,
    pub outputs_written: usize,
}

/// Structured failure info recorded on a `failed` shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardErrorInfo {
    pub code: String,
    pub message: String,
}

/// The persisted `state.json` of one shard.
///
/// Every transition is written as a complete tmp-rename replacement, so a
/// reader never observes a torn state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShardState {
    pub schema_name: String,
    pub schema_version: u32,
    pub batch_id: String,
    pub task_id: String,
    pub shard_id: ShardId,
    pub status: ShardStatus,
    /// How many times this shard has started; preserved across reset.
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ShardErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ShardStats>,
}

impl ShardState {
    /// Fresh `pending` state for a newly scaffolded shard.
    pub fn initial(batch_id: &str, task_id: &str, shard_id: ShardId) -> Self {
        Self {
            schema_name: SCHEMA_SHARD_STATE.to_string(),
            schema_version: SCHEMA_VERSION,
            batch_id: batch_id.to_string(),
            task_id: task_id.to_string(),
            shard_id,
            status: ShardStatus::Pending,
            attempt: 0,
            started_at: None,
            completed_at: None,
            error: None,
            stats: None,
        }
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> RunnerResult<()> {
        fsio::atomic_write_json(path, self)?;
        Ok(())
    }

    /// `pending → running`, bumping the attempt counter.
    pub fn start(&mut self) {
        self.status = ShardStatus::Running;
        self.attempt += 1;
        self.started_at = Some(cb_types::time::utc_now());
        self.completed_at = None;
        self.error = None;
        self.stats = None;
    }

    /// `running → done` with completion stats.
    pub fn complete(&mut self, stats: ShardStats) {
        self.status = ShardStatus::Done;
        self.completed_at = Some(cb_types::time::utc_now());
        self.stats = Some(stats);
    }

    /// `running → failed` with a recorded reason.
    pub fn fail(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.status = ShardStatus::Failed;
        self.completed_at = Some(cb_types::time::utc_now());
        self.error = Some(ShardErrorInfo {
            code: code.into(),
            message: message.into(),
        });
    }

    /// `failed → pending` (operator action). Attempt count is preserved.
    pub fn reset(&mut self) {
        self.status = ShardStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.error = None;
        self.stats = None;
    }
}
