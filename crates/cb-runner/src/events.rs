//! Non-authoritative observability stream.
//!
//! Batch- and task-level `events.jsonl` files record shard lifecycle
//! transitions for humans and dashboards. They are append-only and carry no
//! truth: deleting them loses nothing the outputs indexes don't already
//! hold.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use cb_types::schema::SCHEMA_VERSION;
use cb_types::ShardId;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};
use crate::state::{ShardErrorInfo, ShardStats};

/// One line of an `events.jsonl` stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: u32,
    pub ts: String,
    pub event: String,
    pub batch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_id: Option<ShardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ShardErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ShardStats>,
}

impl Event {
    pub fn shard(
        event: &str,
        batch_id: &str,
        task_id: &str,
        shard_id: ShardId,
        attempt: u32,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ts: cb_types::time::utc_now(),
            event: event.to_string(),
            batch_id: batch_id.to_string(),
            task_id: Some(task_id.to_string()),
            shard_id: Some(shard_id),
            attempt: Some(attempt),
            duration_ms: None,
            error: None,
            stats: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: ShardErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_stats(mut self, stats: ShardStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Append an event to each given stream. Event loss is tolerable; failures
/// here are logged, never propagated into shard state.
pub fn append<P: AsRef<Path>>(paths: &[P], event: &Event) {
    for path in paths {
        let path = path.as_ref();
        if let Err(e) = append_one(path, event) {
            tracing::warn!(path = %path.display(), error = %e, "event append failed");
        }
    }
}

fn append_one(path: &Path, event: &Event) -> RunnerResult<()> {
    let mut line =
        serde_json::to_vec(event).map_err(|e| RunnerError::Serialization(e.to_string()))?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

/// Read an event stream; used by tests and status displays.
pub fn read(path: &Path) -> RunnerResult<Vec<Event>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        events.push(
            serde_json::from_str(line).map_err(|e| RunnerError::Serialization(e.to_string()))?,
        );
    }
    Ok(events)
}
