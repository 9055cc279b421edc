use std::collections::BTreeMap;

use cb_output::{jsonl, OutputRecord};
use cb_runner::BatchManager;
use cb_snapshot::index as snapshot_index;
use cb_store::StoreRoot;
use cb_types::{OutputKind, ShardId};

use crate::error::QueryResult;
use crate::filter::{QueryFilter, StatsGroup};
use crate::order::canonical_sort_records;

/// Scan-based query engine over the authoritative JSONL indexes.
pub struct ScanEngine<'a> {
    root: &'a StoreRoot,
}

impl<'a> ScanEngine<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        Self { root }
    }

    /// All records matching `filter`, in canonical order.
    pub fn query_outputs(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
    ) -> QueryResult<Vec<OutputRecord>> {
        let mut records = Vec::new();
        for task_id in self.task_ids(batch_id, filter)? {
            for shard_id in ShardId::all() {
                let path = self.root.shard_outputs_path(batch_id, &task_id, shard_id);
                for record in jsonl::read_records(&path)? {
                    if filter.matches(&record) {
                        records.push(record);
                    }
                }
            }
        }
        canonical_sort_records(&mut records);
        Ok(records)
    }

    /// Sugar for `kind = diagnostic`.
    pub fn query_diagnostics(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
    ) -> QueryResult<Vec<OutputRecord>> {
        let filter = QueryFilter {
            kind: Some(OutputKind::Diagnostic),
            ..filter.clone()
        };
        self.query_outputs(batch_id, &filter)
    }

    /// Counts grouped by the given axis. `Kind` and `Lang` count every
    /// record; `Severity` and `Code` count diagnostics only.
    pub fn query_stats(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
        group: StatsGroup,
    ) -> QueryResult<BTreeMap<String, u64>> {
        let lang_map = match group {
            StatsGroup::Lang => {
                let batch = BatchManager::new(self.root).load_batch(batch_id)?;
                Some(snapshot_index::lang_by_path(self.root, &batch.snapshot_id)?)
            }
            _ => None,
        };

        let mut counts = BTreeMap::new();
        for record in self.query_outputs(batch_id, filter)? {
            let value = match group {
                StatsGroup::Kind => Some(record.kind.as_str().to_string()),
                StatsGroup::Severity => {
                    if record.kind != OutputKind::Diagnostic {
                        continue;
                    }
                    record.payload.severity.map(|s| s.to_string())
                }
                StatsGroup::Code => {
                    if record.kind != OutputKind::Diagnostic {
                        continue;
                    }
                    record.payload.code.clone()
                }
                StatsGroup::Lang => Some(
                    lang_map
                        .as_ref()
                        .and_then(|m| m.get(&record.path).cloned())
                        .unwrap_or_else(|| "unknown".to_string()),
                ),
            };
            if let Some(value) = value {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Paths that produced error diagnostics, sorted and deduplicated.
    pub fn query_failed_files(&self, batch_id: &str, filter: &QueryFilter) -> QueryResult<Vec<String>> {
        let filter = QueryFilter {
            kind: Some(OutputKind::Diagnostic),
            severity: Some(cb_types::Severity::Error),
            ..filter.clone()
        };
        let mut paths: Vec<String> = self
            .query_outputs(batch_id, &filter)?
            .into_iter()
            .map(|r| r.path)
            .collect();
        paths.dedup();
        Ok(paths)
    }

    fn task_ids(&self, batch_id: &str, filter: &QueryFilter) -> QueryResult<Vec<String>> {
        if let Some(task) = &filter.task {
            return Ok(vec![task.clone()]);
        }
        let plan = BatchManager::new(self.root).load_plan(batch_id)?;
        Ok(plan.task_ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_output::OutputDraft;
    use cb_plan::executor::tests_support::NullExecutor;
    use cb_plan::{Executor, ExecutorContext, ExecutorRegistry, PlanResult};
    use cb_runner::BatchRunner;
    use cb_snapshot::FileEntry;
    use cb_types::Severity;
    use std::fs;

    /// Emits a fixed mix of kinds per file so queries have texture.
    struct MixExecutor;

    impl Executor for MixExecutor {
        fn task_type(&self) -> &str {
            "parse"
        }

        fn execute(
            &self,
            _config: &serde_json::Value,
            files: &[FileEntry],
            _ctx: &dyn ExecutorContext,
        ) -> PlanResult<Vec<OutputDraft>> {
            let mut drafts = Vec::new();
            for file in files {
                drafts.push(OutputDraft::metric(&file.path, "size", file.size));
                if file.path.contains("bad") {
                    drafts.push(OutputDraft::diagnostic(
                        &file.path,
                        Severity::Error,
                        "E001",
                        "broken",
                        3,
                        1,
                    ));
                } else {
                    drafts.push(OutputDraft::diagnostic(
                        &file.path,
                        Severity::Warning,
                        "L001",
                        "untidy",
                        1,
                        2,
                    ));
                }
            }
            Ok(drafts)
        }
    }

    fn registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        registry.register(Box::new(MixExecutor));
        for t in ["analyze", "symbols", "lint"] {
            registry.register(Box::new(NullExecutor::new(t)));
        }
        registry
    }

    fn fixture() -> (tempfile::TempDir, StoreRoot, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = StoreRoot::init(dir.path().join("store")).unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("good.py"), "x = 1\n").unwrap();
        fs::write(src.join("bad.py"), "def broken(\n").unwrap();
        fs::write(src.join("worse_bad.py"), "def broken2(\n").unwrap();

        let snapshot_id = cb_snapshot::SnapshotBuilder::new(&root)
            .build(&src, &cb_snapshot::SnapshotOptions::default())
            .unwrap();
        let batch_id = cb_runner::BatchManager::new(&root)
            .init_batch(&snapshot_id, "parse", &registry())
            .unwrap();
        BatchRunner::new(&root).run(&batch_id, &registry(), None).unwrap();
        (dir, root, batch_id)
    }

    #[test]
    fn outputs_come_back_in_canonical_order() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);
        let records = engine.query_outputs(&batch_id, &QueryFilter::default()).unwrap();
        assert_eq!(records.len(), 6);

        let keys: Vec<String> = records
            .iter()
            .map(|r| cb_types::path::compute_path_key(&r.path))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn kind_filter_restricts() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);
        let filter = QueryFilter {
            kind: Some(OutputKind::Metric),
            ..Default::default()
        };
        let records = engine.query_outputs(&batch_id, &filter).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.kind == OutputKind::Metric));
    }

    #[test]
    fn diagnostics_sugar_and_severity_filter() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);

        let all = engine
            .query_diagnostics(&batch_id, &QueryFilter::default())
            .unwrap();
        assert_eq!(all.len(), 3);

        let errors = engine
            .query_diagnostics(
                &batch_id,
                &QueryFilter {
                    severity: Some(Severity::Error),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn path_filter_narrows() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);
        let filter = QueryFilter {
            path: Some("good".into()),
            ..Default::default()
        };
        let records = engine.query_outputs(&batch_id, &filter).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.path == "good.py"));
    }

    #[test]
    fn stats_by_kind_and_severity() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);

        let by_kind = engine
            .query_stats(&batch_id, &QueryFilter::default(), StatsGroup::Kind)
            .unwrap();
        assert_eq!(by_kind["metric"], 3);
        assert_eq!(by_kind["diagnostic"], 3);

        let by_severity = engine
            .query_stats(&batch_id, &QueryFilter::default(), StatsGroup::Severity)
            .unwrap();
        assert_eq!(by_severity["error"], 2);
        assert_eq!(by_severity["warning"], 1);
    }

    #[test]
    fn stats_by_lang_joins_snapshot() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);
        let by_lang = engine
            .query_stats(&batch_id, &QueryFilter::default(), StatsGroup::Lang)
            .unwrap();
        assert_eq!(by_lang["python"], 6);
    }

    #[test]
    fn failed_files_lists_error_paths() {
        let (_dir, root, batch_id) = fixture();
        let engine = ScanEngine::new(&root);
        let failed = engine
            .query_failed_files(&batch_id, &QueryFilter::default())
            .unwrap();
        assert_eq!(failed, vec!["bad.py".to_string(), "worse_bad.py".to_string()]);
    }
}
