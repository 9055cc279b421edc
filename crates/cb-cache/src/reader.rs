//! Validated cache reads.

use std::collections::BTreeMap;

use cb_output::OutputRecord;
use cb_query::{canonical_sort_records, QueryFilter, StatsGroup};
use cb_runner::BatchManager;
use cb_store::StoreRoot;
use cb_types::OutputKind;
use heed::types::Bytes;
use heed::Database;

use crate::build::{decode_records, CachedFile};
use crate::env::CacheEnv;
use crate::error::{CacheError, CacheResult};
use crate::key;
use crate::meta::CacheMeta;

/// Query interface over a cache that has already passed fingerprint
/// validation. Construction is the validation gate: `open_validated`
/// returns `None` for a missing, corrupt, or stale cache, and the caller
/// falls back to scan.
pub struct CacheReader {
    env: CacheEnv,
    meta: CacheMeta,
}

impl CacheReader {
    /// Open the store's cache if it exists and its fingerprint matches the
    /// current authoritative sources for `batch_id`.
    pub fn open_validated(root: &StoreRoot, batch_id: &str) -> Option<Self> {
        let lmdb_dir = root.lmdb_dir();
        if !CacheEnv::exists(&lmdb_dir) {
            return None;
        }
        let meta = CacheMeta::load(&CacheEnv::meta_path(&lmdb_dir)).ok()?;

        let manager = BatchManager::new(root);
        let batch = manager.load_batch(batch_id).ok()?;
        let plan = manager.load_plan(batch_id).ok()?;
        if !meta.is_valid_for(root, &batch.snapshot_id, batch_id, &plan.task_ids()) {
            tracing::debug!(batch_id, "cache stale; falling back to scan");
            return None;
        }

        let env = CacheEnv::open(&lmdb_dir).ok()?;
        Some(Self { env, meta })
    }

    pub fn meta(&self) -> &CacheMeta {
        &self.meta
    }

    /// File-index entry for one path, from `files_by_path`.
    pub fn get_file(&self, path: &str) -> CacheResult<Option<CachedFile>> {
        let rtxn = self.env.env().read_txn()?;
        let k = key::make_key(&[&self.meta.snapshot_id, path]);
        match self.env.files_by_path().get(&rtxn, &k)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(|e| CacheError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// All records matching `filter`, in canonical order.
    ///
    /// Severity- or code-filtered diagnostic queries use the dedicated
    /// indexes; everything else walks `outputs_by_kind` prefixes.
    pub fn query_outputs(&self, filter: &QueryFilter) -> CacheResult<Vec<OutputRecord>> {
        let snapshot_id = self.meta.snapshot_id.clone();
        let batch_id = self.meta.batch_id.clone();

        let wants_diags = filter.kind == Some(OutputKind::Diagnostic);
        let mut records = if wants_diags && filter.severity.is_some() {
            let severity = filter.severity.expect("checked").to_string();
            self.collect(self.env.diags_by_sev(), filter, |task_id| {
                vec![
                    snapshot_id.clone(),
                    batch_id.clone(),
                    task_id.to_string(),
                    severity.clone(),
                ]
            })?
        } else if wants_diags && filter.code.is_some() {
            let code = filter.code.clone().expect("checked");
            self.collect(self.env.diags_by_code(), filter, |task_id| {
                vec![
                    snapshot_id.clone(),
                    batch_id.clone(),
                    task_id.to_string(),
                    code.clone(),
                ]
            })?
        } else {
            let kind = filter.kind.as_ref().map(|k| k.as_str().to_string());
            self.collect(self.env.outputs_by_kind(), filter, |task_id| {
                let mut parts = vec![snapshot_id.clone(), batch_id.clone(), task_id.to_string()];
                if let Some(kind) = &kind {
                    parts.push(kind.clone());
                }
                parts
            })?
        };
        canonical_sort_records(&mut records);
        Ok(records)
    }

    /// Sugar for `kind = diagnostic`.
    pub fn query_diagnostics(&self, filter: &QueryFilter) -> CacheResult<Vec<OutputRecord>> {
        let filter = QueryFilter {
            kind: Some(OutputKind::Diagnostic),
            ..filter.clone()
        };
        self.query_outputs(&filter)
    }

    /// Counts by group. With only task filtering this reads the
    /// pre-aggregated counters; any record-level filter falls back to
    /// counting the records the cache returns, which matches scan by
    /// construction.
    pub fn query_stats(
        &self,
        filter: &QueryFilter,
        group: StatsGroup,
    ) -> CacheResult<BTreeMap<String, u64>> {
        let filtered = filter.kind.is_some()
            || filter.path.is_some()
            || filter.severity.is_some()
            || filter.code.is_some();
        if filtered {
            return self.stats_from_records(filter, group);
        }

        let rtxn = self.env.env().read_txn()?;
        let mut counts = BTreeMap::new();
        for task_id in self.task_ids(filter) {
            let prefix = key::make_prefix(&[
                &self.meta.snapshot_id,
                &self.meta.batch_id,
                &task_id,
                "count",
                group.as_str(),
            ]);
            for item in self.env.stats().prefix_iter(&rtxn, &prefix)? {
                let (k, v) = item?;
                let parts = key::parse_key(k);
                // [snapshot, batch, task, "count", group, value]
                if let Some(value) = parts.get(5) {
                    *counts.entry(value.clone()).or_insert(0) += key::decode_counter(v);
                }
            }
        }
        Ok(counts)
    }

    fn stats_from_records(
        &self,
        filter: &QueryFilter,
        group: StatsGroup,
    ) -> CacheResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for record in self.query_outputs(filter)? {
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
                    self.get_file(&record.path)?
                        .and_then(|f| f.lang_hint)
                        .unwrap_or_else(|| "unknown".to_string()),
                ),
            };
            if let Some(value) = value {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn task_ids(&self, filter: &QueryFilter) -> Vec<String> {
        match &filter.task {
            Some(task) => vec![task.clone()],
            None => self.meta.tasks_indexed.clone(),
        }
    }

    fn collect<F>(
        &self,
        db: Database<Bytes, Bytes>,
        filter: &QueryFilter,
        prefix_parts: F,
    ) -> CacheResult<Vec<OutputRecord>>
    where
        F: Fn(&str) -> Vec<String>,
    {
        let rtxn = self.env.env().read_txn()?;
        let mut records = Vec::new();
        for task_id in self.task_ids(filter) {
            let parts = prefix_parts(&task_id);
            let part_refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let prefix = key::make_prefix(&part_refs);
            for item in db.prefix_iter(&rtxn, &prefix)? {
                let (_, v) = item?;
                for record in decode_records(v)? {
                    if filter.matches(&record) {
                        records.push(record);
                    }
                }
            }
        }
        Ok(records)
    }
}
