//! Cache metadata and source fingerprinting.
//!
//! The fingerprint is `SHA-256(SHA-256(files.index.jsonl) ‖ Σ
//! SHA-256(shard outputs.index.jsonl))`, where Σ concatenates the raw
//! digests in canonical order (task ids sorted, shards `00`–`ff`). If any
//! authoritative byte changes, the fingerprint changes and the cache is
//! stale.

use std::fs;
use std::path::Path;

use cb_store::StoreRoot;
use cb_types::schema::{Producer, SCHEMA_CACHE_META};
use cb_types::ShardId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

/// Bump when the cache key or value layout changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// `cache_meta.json`, sibling of the LMDB data files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub schema_name: String,
    pub cache_schema_version: u32,
    pub snapshot_id: String,
    pub batch_id: String,
    /// Task ids ingested, sorted.
    pub tasks_indexed: Vec<String>,
    /// Hex fingerprint over the authoritative sources.
    pub source_fingerprint: String,
    /// Store-relative paths of every file the fingerprint covers.
    pub sources: Vec<String>,
    pub built_at: String,
    pub producer: Producer,
}

impl CacheMeta {
    pub fn load(path: &Path) -> CacheResult<Self> {
        if !path.exists() {
            return Err(CacheError::MissingMeta);
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> CacheResult<()> {
        let mut bytes =
            serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization(e.to_string()))?;
        bytes.push(b'\n');
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Whether this metadata still describes the given sources exactly.
    pub fn is_valid_for(
        &self,
        root: &StoreRoot,
        snapshot_id: &str,
        batch_id: &str,
        task_ids: &[String],
    ) -> bool {
        if self.cache_schema_version != CACHE_SCHEMA_VERSION {
            return false;
        }
        if self.snapshot_id != snapshot_id || self.batch_id != batch_id {
            return false;
        }
        let mut expected = task_ids.to_vec();
        expected.sort();
        if self.tasks_indexed != expected {
            return false;
        }
        match compute_fingerprint(root, snapshot_id, batch_id, task_ids) {
            Ok((fingerprint, _)) => fingerprint == self.source_fingerprint,
            Err(_) => false,
        }
    }
}

/// Compute the source fingerprint and the inventory of files it covers.
pub fn compute_fingerprint(
    root: &StoreRoot,
    snapshot_id: &str,
    batch_id: &str,
    task_ids: &[String],
) -> CacheResult<(String, Vec<String>)> {
    let mut outer = Sha256::new();
    let mut sources = Vec::new();

    let index_path = root.file_index_path(snapshot_id);
    outer.update(file_digest(&index_path)?);
    sources.push(format!("snapshots/{snapshot_id}/files.index.jsonl"));

    let mut sorted_tasks = task_ids.to_vec();
    sorted_tasks.sort();
    for task_id in &sorted_tasks {
        for shard_id in ShardId::all() {
            let outputs_path = root.shard_outputs_path(batch_id, task_id, shard_id);
            if !outputs_path.exists() {
                continue;
            }
            outer.update(file_digest(&outputs_path)?);
            sources.push(format!(
                "batches/{batch_id}/tasks/{task_id}/shards/{shard_id}/outputs.index.jsonl"
            ));
        }
    }

    Ok((hex::encode(outer.finalize()), sources))
}

fn file_digest(path: &Path) -> CacheResult<[u8; 32]> {
    let bytes = fs::read(path)?;
    Ok(Sha256::digest(&bytes).into())
}
