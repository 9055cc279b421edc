//! Cache build: ingest authoritative sources into a fresh LMDB env.

use std::collections::BTreeMap;

use cb_output::{jsonl, OutputRecord};
use cb_runner::BatchManager;
use cb_snapshot::index as snapshot_index;
use cb_store::StoreRoot;
use cb_types::schema::SCHEMA_CACHE_META;
use cb_types::{OutputKind, ShardId};
use serde::{Deserialize, Serialize};

use crate::env::CacheEnv;
use crate::error::{CacheError, CacheResult};
use crate::key;
use crate::meta::{compute_fingerprint, CacheMeta, CACHE_SCHEMA_VERSION};

/// Build statistics, reported by `index-build`.
#[derive(Clone, Debug, Serialize)]
pub struct BuildStats {
    pub snapshot_id: String,
    pub batch_id: String,
    pub tasks: Vec<String>,
    pub files_indexed: usize,
    pub outputs_indexed: usize,
    pub diagnostics_indexed: usize,
    pub source_fingerprint: String,
}

/// Value stored in `files_by_path` (bincode).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedFile {
    pub path_key: String,
    pub size: u64,
    pub lang_hint: Option<String>,
}

/// Build (or refresh) the cache for a batch.
///
/// With `rebuild` the whole environment is wiped first. Either way every
/// data database is cleared before ingest, so the cache never mixes two
/// generations of the same batch. Keys follow the `v1␟…` layout in
/// [`crate::key`]; record values are the full JSON records so cache reads
/// reproduce scan reads exactly, and duplicate canonical keys within a
/// shard stay distinct records under one key.
pub fn build_index(root: &StoreRoot, batch_id: &str, rebuild: bool) -> CacheResult<BuildStats> {
    let manager = BatchManager::new(root);
    let batch = manager.load_batch(batch_id)?;
    let plan = manager.load_plan(batch_id)?;
    let snapshot_id = batch.snapshot_id.clone();
    let task_ids = plan.task_ids();

    let lmdb_dir = root.lmdb_dir();
    if rebuild {
        CacheEnv::wipe(&lmdb_dir)?;
    }
    let env = CacheEnv::create(&lmdb_dir)?;

    let mut stats = BuildStats {
        snapshot_id: snapshot_id.clone(),
        batch_id: batch_id.to_string(),
        tasks: task_ids.clone(),
        files_indexed: 0,
        outputs_indexed: 0,
        diagnostics_indexed: 0,
        source_fingerprint: String::new(),
    };

    // Aggregate everything in memory first, then commit in one txn: LMDB
    // wants a single writer, and the sources are modest JSONL files.
    let mut files: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    let mut outputs: BTreeMap<Vec<u8>, Vec<OutputRecord>> = BTreeMap::new();
    let mut diags_by_sev: BTreeMap<Vec<u8>, Vec<OutputRecord>> = BTreeMap::new();
    let mut diags_by_code: BTreeMap<Vec<u8>, Vec<OutputRecord>> = BTreeMap::new();
    let mut counters: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

    let lang_by_path = snapshot_index::lang_by_path(root, &snapshot_id)?;

    for entry in snapshot_index::read_entries(root, &snapshot_id)? {
        let cached = CachedFile {
            path_key: entry.path_key.clone(),
            size: entry.size,
            lang_hint: entry.lang_hint.clone(),
        };
        let value =
            bincode::serialize(&cached).map_err(|e| CacheError::Serialization(e.to_string()))?;
        files.insert(key::make_key(&[&snapshot_id, &entry.path]), value);
        stats.files_indexed += 1;
    }

    for task_id in &task_ids {
        for shard_id in ShardId::all() {
            let path = root.shard_outputs_path(batch_id, task_id, shard_id);
            for record in jsonl::read_records(&path)? {
                let kind = record.kind.as_str().to_string();
                let out_key =
                    key::make_key(&[&snapshot_id, batch_id, task_id, &kind, &record.path]);

                bump(&mut counters, &[&snapshot_id, batch_id, task_id, "count", "kind", &kind]);
                let lang = lang_by_path
                    .get(&record.path)
                    .map(String::as_str)
                    .unwrap_or("unknown");
                bump(&mut counters, &[&snapshot_id, batch_id, task_id, "count", "lang", lang]);

                if record.kind == OutputKind::Diagnostic {
                    let severity = record
                        .payload
                        .severity
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    let code = record.payload.code.clone().unwrap_or_default();
                    let line = record.payload.line.unwrap_or(0).to_string();
                    let column = record.payload.column.unwrap_or(0).to_string();

                    diags_by_sev
                        .entry(key::make_key(&[
                            &snapshot_id,
                            batch_id,
                            task_id,
                            &severity,
                            &code,
                            &record.path,
                            &line,
                            &column,
                        ]))
                        .or_default()
                        .push(record.clone());
                    diags_by_code
                        .entry(key::make_key(&[
                            &snapshot_id,
                            batch_id,
                            task_id,
                            &code,
                            &severity,
                            &record.path,
                            &line,
                            &column,
                        ]))
                        .or_default()
                        .push(record.clone());

                    bump(
                        &mut counters,
                        &[&snapshot_id, batch_id, task_id, "count", "severity", &severity],
                    );
                    bump(&mut counters, &[&snapshot_id, batch_id, task_id, "count", "code", &code]);
                    stats.diagnostics_indexed += 1;
                }

                outputs.entry(out_key).or_default().push(record);
                stats.outputs_indexed += 1;
            }
        }
    }

    let mut wtxn = env.env().write_txn()?;
    env.files_by_path().clear(&mut wtxn)?;
    env.outputs_by_kind().clear(&mut wtxn)?;
    env.diags_by_sev().clear(&mut wtxn)?;
    env.diags_by_code().clear(&mut wtxn)?;
    env.stats().clear(&mut wtxn)?;
    env.meta_db().clear(&mut wtxn)?;

    for (k, v) in &files {
        env.files_by_path().put(&mut wtxn, k, v)?;
    }
    for (k, records) in &outputs {
        env.outputs_by_kind().put(&mut wtxn, k, &encode_records(records)?)?;
    }
    for (k, records) in &diags_by_sev {
        env.diags_by_sev().put(&mut wtxn, k, &encode_records(records)?)?;
    }
    for (k, records) in &diags_by_code {
        env.diags_by_code().put(&mut wtxn, k, &encode_records(records)?)?;
    }
    for (k, count) in &counters {
        env.stats().put(&mut wtxn, k, &key::encode_counter(*count))?;
    }
    env.meta_db().put(
        &mut wtxn,
        &key::make_key(&["cache_schema_version"]),
        &key::encode_counter(CACHE_SCHEMA_VERSION as u64),
    )?;
    wtxn.commit()?;

    let (fingerprint, sources) = compute_fingerprint(root, &snapshot_id, batch_id, &task_ids)?;
    let mut tasks_sorted = task_ids.clone();
    tasks_sorted.sort();
    let meta = CacheMeta {
        schema_name: SCHEMA_CACHE_META.to_string(),
        cache_schema_version: CACHE_SCHEMA_VERSION,
        snapshot_id,
        batch_id: batch_id.to_string(),
        tasks_indexed: tasks_sorted,
        source_fingerprint: fingerprint.clone(),
        sources,
        built_at: cb_types::time::utc_now(),
        producer: cb_types::schema::Producer::current(),
    };
    meta.save(&CacheEnv::meta_path(&lmdb_dir))?;
    stats.source_fingerprint = fingerprint;

    tracing::debug!(
        batch_id,
        files = stats.files_indexed,
        outputs = stats.outputs_indexed,
        "cache built"
    );
    Ok(stats)
}

pub(crate) fn encode_records(records: &[OutputRecord]) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| CacheError::Serialization(e.to_string()))
}

pub(crate) fn decode_records(bytes: &[u8]) -> CacheResult<Vec<OutputRecord>> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
}

fn bump(counters: &mut BTreeMap<Vec<u8>, u64>, parts: &[&str]) {
    *counters.entry(key::make_key(parts)).or_insert(0) += 1;
}
