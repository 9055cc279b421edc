//! Batch-level orchestration: a wavefront over tasks at shard granularity.
//!
//! The scheduler repeatedly collects ready shards (state `pending`, every
//! dependency shard with the same shard id `done`) and drains them through
//! a bounded worker pool. Shards are embarrassingly parallel; no ordering
//! is guaranteed across them. A failed shard never poisons its peers: it
//! simply stops being ready, along with anything downstream of it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use cb_plan::ExecutorRegistry;
use cb_store::StoreRoot;
use cb_types::ShardId;
use serde::Serialize;

use crate::batch::BatchManager;
use crate::error::{RunnerError, RunnerResult};
use crate::lock::StoreLock;
use crate::shard::ShardRunner;
use crate::state::ShardStatus;

/// Outcome of driving a batch.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub batch_id: String,
    pub shards_run: usize,
    pub shards_failed: usize,
    pub shards_skipped: usize,
    pub cancelled: bool,
    pub success: bool,
}

/// Drives every shard of a batch to completion, honoring dependencies.
pub struct BatchRunner<'a> {
    root: &'a StoreRoot,
    workers: usize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { root, workers }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run all shards whose state is `pending`. `done` shards are skipped,
    /// which makes this the same operation as `resume`.
    pub fn run(
        &self,
        batch_id: &str,
        registry: &ExecutorRegistry,
        cancel: Option<&AtomicBool>,
    ) -> RunnerResult<RunReport> {
        let _lock = StoreLock::acquire(self.root.path())?;

        let manager = BatchManager::new(self.root);
        let plan = manager.load_plan(batch_id)?;
        plan.validate(registry)?;

        let shard_runner = ShardRunner::new(self.root);
        let mut report = RunReport {
            batch_id: batch_id.to_string(),
            ..Default::default()
        };
        report.shards_skipped = self.count_status(batch_id, &plan.task_ids(), ShardStatus::Done)?;

        loop {
            if is_cancelled(cancel) {
                report.cancelled = true;
                break;
            }

            let ready = self.collect_ready(batch_id, &plan, &shard_runner)?;
            if ready.is_empty() {
                break;
            }

            let next = AtomicUsize::new(0);
            let completed = AtomicUsize::new(0);
            let failures: Mutex<Vec<RunnerError>> = Mutex::new(Vec::new());
            let cancelled = AtomicBool::new(false);

            thread::scope(|scope| {
                for _ in 0..self.workers.min(ready.len()) {
                    scope.spawn(|| loop {
                        if is_cancelled(cancel) || cancelled.load(Ordering::Relaxed) {
                            return;
                        }
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some((task_id, shard_id)) = ready.get(index) else {
                            return;
                        };
                        match shard_runner.run_shard(batch_id, task_id, *shard_id, registry, cancel)
                        {
                            Ok(_) => {
                                completed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(RunnerError::Cancelled) => {
                                cancelled.store(true, Ordering::Relaxed);
                            }
                            Err(err) => {
                                failures.lock().expect("lock poisoned").push(err);
                                cancelled.store(true, Ordering::Relaxed);
                            }
                        }
                    });
                }
            });

            if let Some(err) = failures.into_inner().expect("lock poisoned").pop() {
                return Err(err);
            }
            report.shards_run += completed.load(Ordering::Relaxed);
            if cancelled.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
        }

        report.shards_failed =
            self.count_status(batch_id, &plan.task_ids(), ShardStatus::Failed)?;
        let done = self.count_status(batch_id, &plan.task_ids(), ShardStatus::Done)?;
        report.success =
            !report.cancelled && done == plan.tasks.len() * cb_types::shard::SHARD_COUNT;

        tracing::debug!(
            batch_id,
            run = report.shards_run,
            failed = report.shards_failed,
            success = report.success,
            "batch run finished"
        );
        Ok(report)
    }

    /// Shards ready to run: state `pending` with every dependency shard
    /// `done`. A `running` state is also ready — this process holds the
    /// writer lock, so such a shard is a crash leftover whose attempt
    /// never committed.
    fn collect_ready(
        &self,
        batch_id: &str,
        plan: &cb_plan::Plan,
        shard_runner: &ShardRunner<'_>,
    ) -> RunnerResult<Vec<(String, ShardId)>> {
        let manager = BatchManager::new(self.root);
        let mut ready = Vec::new();
        for task in &plan.tasks {
            for shard_id in ShardId::all() {
                let state = manager.load_shard_state(batch_id, &task.task_id, shard_id)?;
                if !matches!(state.status, ShardStatus::Pending | ShardStatus::Running) {
                    continue;
                }
                if shard_runner.deps_done(batch_id, &task.deps, shard_id)?.is_empty() {
                    ready.push((task.task_id.clone(), shard_id));
                }
            }
        }
        Ok(ready)
    }

    fn count_status(
        &self,
        batch_id: &str,
        task_ids: &[String],
        status: ShardStatus,
    ) -> RunnerResult<usize> {
        let manager = BatchManager::new(self.root);
        let mut count = 0;
        for task_id in task_ids {
            for shard_id in ShardId::all() {
                if manager.load_shard_state(batch_id, task_id, shard_id)?.status == status {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_output::{jsonl, OutputDraft};
    use cb_plan::executor::tests_support::NullExecutor;
    use cb_plan::{Executor, ExecutorContext, PlanResult};
    use cb_snapshot::FileEntry;
    use cb_types::{OutputKind, Severity};
    use std::fs;

    /// Parse stand-in: one diagnostic per file.
    struct StubParse;

    impl Executor for StubParse {
        fn task_type(&self) -> &str {
            "parse"
        }

        fn execute(
            &self,
            _config: &serde_json::Value,
            files: &[FileEntry],
            _ctx: &dyn ExecutorContext,
        ) -> PlanResult<Vec<OutputDraft>> {
            Ok(files
                .iter()
                .map(|f| {
                    OutputDraft::diagnostic(&f.path, Severity::Info, "P000", "parsed", 1, 1)
                })
                .collect())
        }
    }

    /// Analyze stand-in: one metric per prior parse output.
    struct StubAnalyze;

    impl Executor for StubAnalyze {
        fn task_type(&self) -> &str {
            "analyze"
        }

        fn execute(
            &self,
            _config: &serde_json::Value,
            _files: &[FileEntry],
            ctx: &dyn ExecutorContext,
        ) -> PlanResult<Vec<OutputDraft>> {
            let prior = ctx.iter_prior_outputs("01_parse", Some(&OutputKind::Diagnostic))?;
            Ok(prior
                .iter()
                .map(|r| OutputDraft::metric(&r.path, "seen", 1))
                .collect())
        }
    }

    fn registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        registry.register(Box::new(StubParse));
        registry.register(Box::new(StubAnalyze));
        registry.register(Box::new(NullExecutor::new("symbols")));
        registry.register(Box::new(NullExecutor::new("lint")));
        registry
    }

    fn fixture(pipeline: &str) -> (tempfile::TempDir, StoreRoot, String, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = StoreRoot::init(dir.path().join("store")).unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.py"), "a = 1\n").unwrap();
        fs::write(src.join("b.py"), "b = 2\n").unwrap();
        fs::write(src.join("c.py"), "c = 3\n").unwrap();

        let snapshot_id = cb_snapshot::SnapshotBuilder::new(&root)
            .build(&src, &cb_snapshot::SnapshotOptions::default())
            .unwrap();
        let batch_id = BatchManager::new(&root)
            .init_batch(&snapshot_id, pipeline, &registry())
            .unwrap();
        (dir, root, snapshot_id, batch_id)
    }

    fn all_outputs(root: &StoreRoot, batch_id: &str, task_id: &str) -> Vec<cb_output::OutputRecord> {
        ShardId::all()
            .flat_map(|shard| {
                jsonl::read_records(&root.shard_outputs_path(batch_id, task_id, shard)).unwrap()
            })
            .collect()
    }

    #[test]
    fn run_drives_all_shards_to_done() {
        let (_dir, root, _snapshot_id, batch_id) = fixture("parse");
        let report = BatchRunner::new(&root)
            .with_workers(4)
            .run(&batch_id, &registry(), None)
            .unwrap();

        assert!(report.success);
        assert_eq!(report.shards_failed, 0);
        assert_eq!(report.shards_run, 256);
        assert_eq!(all_outputs(&root, &batch_id, "01_parse").len(), 3);
    }

    #[test]
    fn dependent_task_sees_prior_outputs() {
        let (_dir, root, _snapshot_id, batch_id) = fixture("analyze");
        let report = BatchRunner::new(&root)
            .with_workers(2)
            .run(&batch_id, &registry(), None)
            .unwrap();

        assert!(report.success);
        let metrics = all_outputs(&root, &batch_id, "02_analyze");
        assert_eq!(metrics.len(), 3);
        assert!(metrics.iter().all(|r| r.kind == OutputKind::Metric));
    }

    #[test]
    fn resume_after_deleting_shard_artifacts_restores_them() {
        let (_dir, root, snapshot_id, batch_id) = fixture("parse");
        BatchRunner::new(&root).run(&batch_id, &registry(), None).unwrap();

        // Find the shard holding a.py and destroy its committed artifacts.
        let entries = cb_snapshot::index::read_entries(&root, &snapshot_id).unwrap();
        let shard = ShardId::of_path_key(&entries[0].path_key);
        let outputs_path = root.shard_outputs_path(&batch_id, "01_parse", shard);
        let before = jsonl::read_records(&outputs_path).unwrap();
        assert!(!before.is_empty());

        fs::remove_file(&outputs_path).unwrap();
        crate::state::ShardState::initial(&batch_id, "01_parse", shard)
            .save(&root.shard_state_path(&batch_id, "01_parse", shard))
            .unwrap();

        let report = BatchRunner::new(&root).run(&batch_id, &registry(), None).unwrap();
        assert!(report.success);
        assert_eq!(report.shards_run, 1);

        let mut after = jsonl::read_records(&outputs_path).unwrap();
        let mut before = before;
        for record in before.iter_mut().chain(after.iter_mut()) {
            record.header.ts.clear();
        }
        assert_eq!(before, after);
    }

    #[test]
    fn rerun_of_complete_batch_is_a_noop() {
        let (_dir, root, _snapshot_id, batch_id) = fixture("parse");
        BatchRunner::new(&root).run(&batch_id, &registry(), None).unwrap();

        let report = BatchRunner::new(&root).run(&batch_id, &registry(), None).unwrap();
        assert!(report.success);
        assert_eq!(report.shards_run, 0);
        assert_eq!(report.shards_skipped, 256);
    }

    #[test]
    fn pre_set_cancel_flag_runs_nothing() {
        let (_dir, root, _snapshot_id, batch_id) = fixture("parse");
        let cancel = AtomicBool::new(true);
        let report = BatchRunner::new(&root)
            .run(&batch_id, &registry(), Some(&cancel))
            .unwrap();
        assert!(report.cancelled);
        assert!(!report.success);
        assert_eq!(report.shards_run, 0);
    }
}
