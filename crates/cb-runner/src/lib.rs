//! Batch, task, and shard execution.
//!
//! A batch is one execution attempt bound to one snapshot. Its tasks run as
//! 256 independent shards each; a shard moves through a monotonic state
//! machine (`pending → running → done | failed`) persisted by tmp-rename,
//! and commits its outputs index only as a complete atomic replacement.
//! Retrying a shard under the determinism contract reproduces the same
//! index (up to `ts`), so crash recovery is just re-running.
//!
//! # Key Types
//!
//! - [`BatchManager`] — Materializes batch/task/shard scaffolding
//! - [`ShardRunner`] — Executes one shard with atomic commit
//! - [`BatchRunner`] — Wavefront scheduler over all shards, worker pool
//! - [`ShardState`] / [`ShardStatus`] — The persisted state machine
//! - [`StoreLock`] — Advisory single-writer lock on the store root

pub mod batch;
pub mod error;
pub mod events;
pub mod lock;
pub mod run;
pub mod shard;
pub mod state;

pub use batch::{BatchManager, BatchMeta, TaskMeta};
pub use error::{RunnerError, RunnerResult};
pub use run::{BatchRunner, RunReport};
pub use shard::ShardRunner;
pub use state::{ShardState, ShardStats, ShardStatus};
