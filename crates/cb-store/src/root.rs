use std::fs;
use std::path::{Path, PathBuf};

use cb_types::schema::{Producer, SCHEMA_STORE, SCHEMA_VERSION};
use cb_types::ShardId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::fsio;

/// Store-level metadata persisted as `store.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_name: String,
    pub schema_version: u32,
    pub producer: Producer,
    pub created_at: String,
}

/// Validated handle on a store root directory.
///
/// `StoreRoot` is the single source of every path the substrate touches;
/// nothing outside this module concatenates store paths by hand. Opening a
/// root validates `store.json`; initializing one creates the full layout.
#[derive(Clone, Debug)]
pub struct StoreRoot {
    root: PathBuf,
}

impl StoreRoot {
    /// Initialize a new store at `root`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if `store.json` is present
    /// or the directory exists and is non-empty.
    pub fn init(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root: PathBuf = root.into();

        if root.join("store.json").exists() {
            return Err(StoreError::AlreadyExists(root));
        }
        if root.exists() && fs::read_dir(&root)?.next().is_some() {
            return Err(StoreError::AlreadyExists(root));
        }

        fs::create_dir_all(root.join("objects").join("sha256"))?;
        fs::create_dir_all(root.join("snapshots"))?;
        fs::create_dir_all(root.join("batches"))?;

        let meta = StoreMeta {
            schema_name: SCHEMA_STORE.to_string(),
            schema_version: SCHEMA_VERSION,
            producer: Producer::current(),
            created_at: cb_types::time::utc_now(),
        };
        fsio::atomic_write_json(&root.join("store.json"), &meta)?;

        tracing::debug!(root = %root.display(), "initialized store");
        Ok(Self { root })
    }

    /// Open an existing store, validating `store.json`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root: PathBuf = root.into();

        if !root.exists() {
            return Err(StoreError::NotFound(root));
        }
        let meta_path = root.join("store.json");
        if !meta_path.exists() {
            return Err(StoreError::Invalid {
                path: root,
                reason: "missing store.json".to_string(),
            });
        }

        let bytes = fs::read(&meta_path)?;
        let meta: StoreMeta =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Invalid {
                path: root.clone(),
                reason: format!("invalid store.json: {e}"),
            })?;
        if meta.schema_name != SCHEMA_STORE {
            return Err(StoreError::Invalid {
                path: root,
                reason: format!("unexpected schema_name: {}", meta.schema_name),
            });
        }

        Ok(Self { root })
    }

    /// Load the store metadata.
    pub fn meta(&self) -> StoreResult<StoreMeta> {
        let bytes = fs::read(self.root.join("store.json"))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    // -- layout ------------------------------------------------------------

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects").join("sha256")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn snapshot_dir(&self, snapshot_id: &str) -> PathBuf {
        self.snapshots_dir().join(snapshot_id)
    }

    pub fn snapshot_meta_path(&self, snapshot_id: &str) -> PathBuf {
        self.snapshot_dir(snapshot_id).join("snapshot.json")
    }

    pub fn file_index_path(&self, snapshot_id: &str) -> PathBuf {
        self.snapshot_dir(snapshot_id).join("files.index.jsonl")
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.root.join("batches")
    }

    pub fn batch_dir(&self, batch_id: &str) -> PathBuf {
        self.batches_dir().join(batch_id)
    }

    pub fn batch_meta_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join("batch.json")
    }

    pub fn plan_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join("plan.json")
    }

    pub fn batch_events_path(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join("events.jsonl")
    }

    pub fn task_dir(&self, batch_id: &str, task_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join("tasks").join(task_id)
    }

    pub fn task_meta_path(&self, batch_id: &str, task_id: &str) -> PathBuf {
        self.task_dir(batch_id, task_id).join("task.json")
    }

    pub fn task_events_path(&self, batch_id: &str, task_id: &str) -> PathBuf {
        self.task_dir(batch_id, task_id).join("events.jsonl")
    }

    pub fn shard_dir(&self, batch_id: &str, task_id: &str, shard_id: ShardId) -> PathBuf {
        self.task_dir(batch_id, task_id)
            .join("shards")
            .join(shard_id.to_string())
    }

    pub fn shard_state_path(&self, batch_id: &str, task_id: &str, shard_id: ShardId) -> PathBuf {
        self.shard_dir(batch_id, task_id, shard_id).join("state.json")
    }

    pub fn shard_outputs_path(&self, batch_id: &str, task_id: &str, shard_id: ShardId) -> PathBuf {
        self.shard_dir(batch_id, task_id, shard_id)
            .join("outputs.index.jsonl")
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.root.join("indexes")
    }

    pub fn lmdb_dir(&self) -> PathBuf {
        self.indexes_dir().join("lmdb")
    }

    // -- listings ----------------------------------------------------------

    /// Snapshot ids present in the store, sorted.
    pub fn list_snapshots(&self) -> StoreResult<Vec<String>> {
        self.list_subdirs_with(&self.snapshots_dir(), "snapshot.json")
    }

    /// Batch ids present in the store, sorted.
    pub fn list_batches(&self) -> StoreResult<Vec<String>> {
        self.list_subdirs_with(&self.batches_dir(), "batch.json")
    }

    fn list_subdirs_with(&self, dir: &Path, marker: &str) -> StoreResult<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().is_dir() && entry.path().join(marker).exists() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = StoreRoot::init(&root).unwrap();

        assert!(store.objects_dir().exists());
        assert!(store.snapshots_dir().exists());
        assert!(store.batches_dir().exists());
        assert!(root.join("store.json").exists());
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        StoreRoot::init(&root).unwrap();
        assert!(matches!(
            StoreRoot::init(&root),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn open_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreRoot::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn open_without_store_json_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreRoot::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[test]
    fn open_roundtrips_meta() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        StoreRoot::init(&root).unwrap();

        let store = StoreRoot::open(&root).unwrap();
        let meta = store.meta().unwrap();
        assert_eq!(meta.schema_name, SCHEMA_STORE);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn listings_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreRoot::init(dir.path().join("store")).unwrap();
        assert!(store.list_snapshots().unwrap().is_empty());
        assert!(store.list_batches().unwrap().is_empty());
    }

    #[test]
    fn shard_paths_use_two_hex_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreRoot::init(dir.path().join("store")).unwrap();
        let shard: ShardId = "ab".parse().unwrap();
        let path = store.shard_outputs_path("b1", "t1", shard);
        assert!(path.ends_with("batches/b1/tasks/t1/shards/ab/outputs.index.jsonl"));
    }
}
