use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cb_output::{chunk, jsonl, OutputRecord, RecordHeader};
use cb_plan::{ExecutorContext, ExecutorRegistry, PlanError, PlanResult};
use cb_snapshot::{index as snapshot_index, FileEntry};
use cb_store::{ObjectStore, StoreRoot};
use cb_types::schema::SCHEMA_VERSION;
use cb_types::{ObjectId, OutputKind, ShardId};

use crate::batch::BatchManager;
use crate::error::{RunnerError, RunnerResult};
use crate::events::{self, Event};
use crate::state::{ShardState, ShardStats, ShardStatus};

/// Executes single shards with atomic output commit.
///
/// A shard writes only inside its own shard directory plus CAS additions.
/// Because the outputs index is committed as a complete replacement, a
/// crash mid-run leaves at worst orphan CAS blobs and a `running` state;
/// re-running the shard is always safe.
pub struct ShardRunner<'a> {
    root: &'a StoreRoot,
    cas: ObjectStore,
    manager: BatchManager<'a>,
}

impl<'a> ShardRunner<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        Self {
            root,
            cas: ObjectStore::new(root),
            manager: BatchManager::new(root),
        }
    }

    /// Run one shard to completion.
    ///
    /// - `done` shards return immediately (idempotent).
    /// - `failed` shards are reset first: an explicit re-run is the
    ///   operator's retry action.
    /// - `running` shards are restarted: that state after a crash means the
    ///   previous attempt never committed.
    ///
    /// Executor failure moves the shard to `failed` and returns the state;
    /// it is not an error of the runner itself.
    pub fn run_shard(
        &self,
        batch_id: &str,
        task_id: &str,
        shard_id: ShardId,
        registry: &ExecutorRegistry,
        cancel: Option<&AtomicBool>,
    ) -> RunnerResult<ShardState> {
        let state_path = self.root.shard_state_path(batch_id, task_id, shard_id);
        let mut state = ShardState::load(&state_path)?;

        if state.status == ShardStatus::Done {
            return Ok(state);
        }
        if state.status == ShardStatus::Failed {
            state.reset();
        }

        let task = self.manager.load_task(batch_id, task_id)?;
        self.check_deps(batch_id, &task.deps, task_id, shard_id)?;

        let batch = self.manager.load_batch(batch_id)?;
        let snapshot_id = batch.snapshot_id.clone();

        state.start();
        state.save(&state_path)?;

        let batch_events = self.root.batch_events_path(batch_id);
        let task_events = self.root.task_events_path(batch_id, task_id);
        events::append(
            &[&task_events, &batch_events],
            &Event::shard("shard_started", batch_id, task_id, shard_id, state.attempt),
        );

        let started = Instant::now();
        let result = self.execute_shard(
            batch_id,
            task_id,
            shard_id,
            &snapshot_id,
            &task.config,
            &task.deps,
            &task.task_type,
            registry,
            cancel,
        );
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(stats) => {
                state.complete(stats.clone());
                state.save(&state_path)?;
                events::append(
                    &[&task_events, &batch_events],
                    &Event::shard("shard_completed", batch_id, task_id, shard_id, state.attempt)
                        .with_duration(duration_ms)
                        .with_stats(stats),
                );
            }
            Err(RunnerError::Cancelled) => {
                // Cooperative cancel: nothing was committed, the state
                // stays `running` and resume will retry this shard.
                return Err(RunnerError::Cancelled);
            }
            Err(err) => {
                state.fail("EXECUTOR_FAILED", err.to_string());
                state.save(&state_path)?;
                events::append(
                    &[&task_events, &batch_events],
                    &Event::shard("shard_failed", batch_id, task_id, shard_id, state.attempt)
                        .with_duration(duration_ms)
                        .with_error(state.error.clone().expect("just set")),
                );
                tracing::warn!(batch_id, task_id, shard = %shard_id, error = %err, "shard failed");
            }
        }
        Ok(state)
    }

    /// Reset a `failed` shard back to `pending` (operator action).
    pub fn reset_shard(
        &self,
        batch_id: &str,
        task_id: &str,
        shard_id: ShardId,
    ) -> RunnerResult<ShardState> {
        let state_path = self.root.shard_state_path(batch_id, task_id, shard_id);
        let mut state = ShardState::load(&state_path)?;
        if state.status != ShardStatus::Failed {
            return Err(RunnerError::InvalidTransition {
                task_id: task_id.to_string(),
                shard_id,
                status: state.status.to_string(),
                action: "reset",
            });
        }
        state.reset();
        state.save(&state_path)?;
        events::append(
            &[&self.root.task_events_path(batch_id, task_id)],
            &Event::shard("shard_reset", batch_id, task_id, shard_id, state.attempt),
        );
        Ok(state)
    }

    /// Whether every dependency shard with this shard id is `done`.
    pub fn deps_done(
        &self,
        batch_id: &str,
        deps: &[String],
        shard_id: ShardId,
    ) -> RunnerResult<Vec<String>> {
        let mut incomplete = Vec::new();
        for dep in deps {
            let state = self.manager.load_shard_state(batch_id, dep, shard_id)?;
            if state.status != ShardStatus::Done {
                incomplete.push(dep.clone());
            }
        }
        Ok(incomplete)
    }

    fn check_deps(
        &self,
        batch_id: &str,
        deps: &[String],
        task_id: &str,
        shard_id: ShardId,
    ) -> RunnerResult<()> {
        let incomplete = self.deps_done(batch_id, deps, shard_id)?;
        if !incomplete.is_empty() {
            return Err(RunnerError::DepsUnsatisfied {
                task_id: task_id.to_string(),
                shard_id,
                incomplete,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_shard(
        &self,
        batch_id: &str,
        task_id: &str,
        shard_id: ShardId,
        snapshot_id: &str,
        config: &serde_json::Value,
        deps: &[String],
        task_type: &str,
        registry: &ExecutorRegistry,
        cancel: Option<&AtomicBool>,
    ) -> RunnerResult<ShardStats> {
        let executor = registry
            .get(task_type)
            .ok_or_else(|| PlanError::UnknownType {
                task: task_id.to_string(),
                task_type: task_type.to_string(),
            })?;

        // This shard's slice of the snapshot, in canonical order.
        let files: Vec<FileEntry> = snapshot_index::read_entries(self.root, snapshot_id)?
            .into_iter()
            .filter(|entry| ShardId::of_path_key(&entry.path_key) == shard_id)
            .collect();
        let files_processed = files.len();

        if is_cancelled(cancel) {
            return Err(RunnerError::Cancelled);
        }

        let ctx = ShardContext {
            root: self.root,
            cas: &self.cas,
            batch_id,
            shard_id,
            deps,
            chunk_threshold: config
                .get("chunk_threshold")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(chunk::CHUNK_THRESHOLD),
        };

        let drafts = executor
            .execute(config, &files, &ctx)
            .map_err(|e| match e {
                err @ PlanError::ExecutorFailed { .. } => RunnerError::Plan(err),
                other => RunnerError::Plan(PlanError::ExecutorFailed {
                    task_type: task_type.to_string(),
                    reason: other.to_string(),
                }),
            })?;

        // The cancel flag is observed after the executor's emissions and
        // before commit; a cancelled shard commits nothing.
        if is_cancelled(cancel) {
            return Err(RunnerError::Cancelled);
        }

        let ts = cb_types::time::utc_now();
        let mut records = Vec::with_capacity(drafts.len());
        for draft in drafts {
            draft.validate()?;
            records.push(OutputRecord::from_draft(
                draft,
                RecordHeader {
                    schema_version: SCHEMA_VERSION,
                    snapshot_id: snapshot_id.to_string(),
                    batch_id: batch_id.to_string(),
                    task_id: task_id.to_string(),
                    shard_id,
                    ts: ts.clone(),
                },
            ));
        }
        let outputs_written = records.len();

        jsonl::write_records(
            &self.root.shard_outputs_path(batch_id, task_id, shard_id),
            &records,
        )?;

        Ok(ShardStats {
            files_processed,
            outputs_written,
        })
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false)
}

/// The capability surface an executor sees: prior outputs restricted to
/// this shard and this task's declared deps, plus chunk-aware CAS access.
struct ShardContext<'a> {
    root: &'a StoreRoot,
    cas: &'a ObjectStore,
    batch_id: &'a str,
    shard_id: ShardId,
    deps: &'a [String],
    chunk_threshold: usize,
}

impl ExecutorContext for ShardContext<'_> {
    fn iter_prior_outputs(
        &self,
        task_id: &str,
        kind: Option<&OutputKind>,
    ) -> PlanResult<Vec<OutputRecord>> {
        if !self.deps.iter().any(|d| d == task_id) {
            return Err(PlanError::UnknownDep {
                task: "executor".to_string(),
                dep: task_id.to_string(),
            });
        }
        let records = jsonl::read_records(&self.root.shard_outputs_path(
            self.batch_id,
            task_id,
            self.shard_id,
        ))?;
        Ok(records
            .into_iter()
            .filter(|r| kind.map(|k| r.kind == *k).unwrap_or(true))
            .collect())
    }

    fn put_object(
        &self,
        kind: &OutputKind,
        format: &str,
        bytes: &[u8],
    ) -> PlanResult<(ObjectId, String)> {
        Ok(chunk::store_payload(
            self.cas,
            kind,
            format,
            bytes,
            self.chunk_threshold,
            chunk::CHUNK_SIZE,
        )?)
    }

    fn get_object(&self, id: &ObjectId) -> PlanResult<Vec<u8>> {
        Ok(chunk::load_payload(self.cas, id)?)
    }
}
