//! Atomic file replacement.
//!
//! Every mutable file in the store (`state.json`, `outputs.index.jsonl`,
//! `snapshot.json`, …) is written as a complete replacement: stream to a
//! sibling temp file, fsync, then rename over the target. A reader always
//! sees either the old complete file or the new complete file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreResult;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A process-unique temp-file suffix: pid plus a monotonic counter, so
/// concurrent writers within and across processes never share a temp path.
fn tmp_suffix() -> String {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("tmp.{}.{}", std::process::id(), seq)
}

/// Write `bytes` to `path` atomically via tmp + fsync + rename.
///
/// The parent directory must exist. On failure the temp file is removed
/// on a best-effort basis and the target is left untouched.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{file_name}.{}", tmp_suffix()));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Serialize `value` as pretty JSON with a trailing newline and write it
/// atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| crate::error::StoreError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"data").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.txt"]);
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("out.txt");
        assert!(atomic_write(&path, b"x").is_err());
    }

    #[test]
    fn json_writer_appends_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        atomic_write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
    }
}
