use std::fs;

use cb_plan::{pipeline, ExecutorRegistry, Plan, TaskSpec};
use cb_snapshot::index as snapshot_index;
use cb_store::{fsio, StoreRoot};
use cb_types::schema::{Producer, SCHEMA_BATCH, SCHEMA_TASK, SCHEMA_VERSION};
use cb_types::ShardId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RunnerError, RunnerResult};
use crate::state::ShardState;

/// Batch metadata persisted as `batch.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub schema_name: String,
    pub schema_version: u32,
    pub producer: Producer,
    pub batch_id: String,
    pub snapshot_id: String,
    pub pipeline: String,
    pub created_at: String,
}

/// Task metadata persisted as `task.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub schema_name: String,
    pub schema_version: u32,
    pub batch_id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub sharding: Sharding,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
    pub config: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sharding {
    pub strategy: String,
    pub shard_count: usize,
}

/// Creates and loads batch scaffolding.
///
/// `init_batch` materializes the complete skeleton up front: `batch.json`,
/// `plan.json`, an empty batch event stream, and per task a `task.json`,
/// event stream, and all 256 shard directories with `pending` state and an
/// empty outputs index. Execution afterwards only ever replaces files
/// inside shard directories.
pub struct BatchManager<'a> {
    root: &'a StoreRoot,
}

impl<'a> BatchManager<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        Self { root }
    }

    /// Generate a batch id: `batch-YYYYMMDD-HHMMSS-<8 hex>`.
    pub fn generate_batch_id() -> String {
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        format!("batch-{}-{}", cb_types::time::utc_id_stamp(), suffix)
    }

    /// Materialize a new batch for `snapshot_id` from a named pipeline.
    pub fn init_batch(
        &self,
        snapshot_id: &str,
        pipeline_name: &str,
        registry: &ExecutorRegistry,
    ) -> RunnerResult<String> {
        // The snapshot must exist before any scaffolding is written.
        snapshot_index::read_meta(self.root, snapshot_id)?;

        let pipeline = pipeline::lookup(pipeline_name)?;
        let batch_id = Self::generate_batch_id();

        let plan = Plan::new(&batch_id, pipeline.tasks.clone());
        plan.validate(registry)?;

        let batch_dir = self.root.batch_dir(&batch_id);
        if batch_dir.exists() {
            return Err(RunnerError::BatchExists(batch_id));
        }
        fs::create_dir_all(&batch_dir)?;

        let meta = BatchMeta {
            schema_name: SCHEMA_BATCH.to_string(),
            schema_version: SCHEMA_VERSION,
            producer: Producer::current(),
            batch_id: batch_id.clone(),
            snapshot_id: snapshot_id.to_string(),
            pipeline: pipeline_name.to_string(),
            created_at: cb_types::time::utc_now(),
        };
        fsio::atomic_write_json(&self.root.batch_meta_path(&batch_id), &meta)?;
        fsio::atomic_write_json(&self.root.plan_path(&batch_id), &plan)?;
        fs::File::create(self.root.batch_events_path(&batch_id))?;

        for task in &plan.tasks {
            self.scaffold_task(&batch_id, task)?;
        }

        tracing::debug!(batch_id, snapshot_id, pipeline = pipeline_name, "batch initialized");
        Ok(batch_id)
    }

    fn scaffold_task(&self, batch_id: &str, task: &TaskSpec) -> RunnerResult<()> {
        let task_dir = self.root.task_dir(batch_id, &task.task_id);
        fs::create_dir_all(&task_dir)?;

        let meta = TaskMeta {
            schema_name: SCHEMA_TASK.to_string(),
            schema_version: SCHEMA_VERSION,
            batch_id: batch_id.to_string(),
            task_id: task.task_id.clone(),
            task_type: task.task_type.clone(),
            sharding: Sharding {
                strategy: "path_key_hash".to_string(),
                shard_count: cb_types::shard::SHARD_COUNT,
            },
            deps: task.deps.clone(),
            config: task.config.clone(),
        };
        fsio::atomic_write_json(&self.root.task_meta_path(batch_id, &task.task_id), &meta)?;
        fs::File::create(self.root.task_events_path(batch_id, &task.task_id))?;

        for shard_id in ShardId::all() {
            let shard_dir = self.root.shard_dir(batch_id, &task.task_id, shard_id);
            fs::create_dir_all(&shard_dir)?;
            ShardState::initial(batch_id, &task.task_id, shard_id)
                .save(&self.root.shard_state_path(batch_id, &task.task_id, shard_id))?;
            fs::File::create(self.root.shard_outputs_path(batch_id, &task.task_id, shard_id))?;
        }
        Ok(())
    }

    // -- loading -----------------------------------------------------------

    pub fn load_batch(&self, batch_id: &str) -> RunnerResult<BatchMeta> {
        let path = self.root.batch_meta_path(batch_id);
        if !path.exists() {
            return Err(RunnerError::BatchNotFound(batch_id.to_string()));
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    pub fn load_plan(&self, batch_id: &str) -> RunnerResult<Plan> {
        let path = self.root.plan_path(batch_id);
        if !path.exists() {
            return Err(RunnerError::BatchNotFound(batch_id.to_string()));
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    pub fn load_task(&self, batch_id: &str, task_id: &str) -> RunnerResult<TaskMeta> {
        let path = self.root.task_meta_path(batch_id, task_id);
        if !path.exists() {
            return Err(RunnerError::TaskNotFound {
                batch_id: batch_id.to_string(),
                task_id: task_id.to_string(),
            });
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    pub fn load_shard_state(
        &self,
        batch_id: &str,
        task_id: &str,
        shard_id: ShardId,
    ) -> RunnerResult<ShardState> {
        ShardState::load(&self.root.shard_state_path(batch_id, task_id, shard_id))
    }
}
