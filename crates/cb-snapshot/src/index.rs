//! Readers over a snapshot's persisted artifacts.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};

use cb_store::StoreRoot;

use crate::builder::SnapshotMeta;
use crate::entry::FileEntry;
use crate::error::{SnapshotError, SnapshotResult};

/// Load `snapshot.json` for a snapshot.
pub fn read_meta(root: &StoreRoot, snapshot_id: &str) -> SnapshotResult<SnapshotMeta> {
    let path = root.snapshot_meta_path(snapshot_id);
    if !path.exists() {
        return Err(SnapshotError::NotFound(snapshot_id.to_string()));
    }
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| SnapshotError::Serialization(e.to_string()))
}

/// Load every file-index entry, in canonical (stored) order.
pub fn read_entries(root: &StoreRoot, snapshot_id: &str) -> SnapshotResult<Vec<FileEntry>> {
    let path = root.file_index_path(snapshot_id);
    if !path.exists() {
        return Err(SnapshotError::NotFound(snapshot_id.to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: FileEntry = serde_json::from_str(&line)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Map from canonical path to `lang_hint`, used by the stats joins.
pub fn lang_by_path(root: &StoreRoot, snapshot_id: &str) -> SnapshotResult<HashMap<String, String>> {
    let mut map = HashMap::new();
    for entry in read_entries(root, snapshot_id)? {
        if let Some(lang) = entry.lang_hint {
            map.insert(entry.path, lang);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{SnapshotBuilder, SnapshotOptions};
    use std::path::Path;

    fn snapshot_fixture() -> (tempfile::TempDir, StoreRoot, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = StoreRoot::init(dir.path().join("store")).unwrap();
        let src = dir.path().join("src");
        write_file(&src, "main.py", "import sys\n");
        write_file(&src, "notes.txt", "hello\n");
        let id = SnapshotBuilder::new(&root)
            .build(&src, &SnapshotOptions::default())
            .unwrap();
        (dir, root, id)
    }

    fn write_file(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn meta_roundtrip() {
        let (_dir, root, id) = snapshot_fixture();
        let meta = read_meta(&root, &id).unwrap();
        assert_eq!(meta.snapshot_id, id);
        assert_eq!(meta.file_count, 2);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let (_dir, root, _id) = snapshot_fixture();
        assert!(matches!(
            read_meta(&root, "deadbeef"),
            Err(SnapshotError::NotFound(_))
        ));
        assert!(matches!(
            read_entries(&root, "deadbeef"),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn lang_map_only_holds_hinted_files() {
        let (_dir, root, id) = snapshot_fixture();
        let map = lang_by_path(&root, &id).unwrap();
        assert_eq!(map.get("main.py").map(String::as_str), Some("python"));
        assert!(!map.contains_key("notes.txt"));
    }
}
