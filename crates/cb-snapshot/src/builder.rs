use std::fs;
use std::path::Path;

use cb_store::{fsio, ObjectStore, StoreRoot};
use cb_types::schema::{Producer, SCHEMA_SNAPSHOT, SCHEMA_VERSION};
use cb_types::{path as cbpath, ObjectId};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::entry::{detect_lang_hint, FileEntry};
use crate::error::{SnapshotError, SnapshotResult};

/// Options controlling a snapshot walk.
#[derive(Clone, Debug, Default)]
pub struct SnapshotOptions {
    /// Include globs over canonical paths. Empty means "everything".
    pub include: Vec<String>,
    /// Exclude globs over canonical paths. Applied after includes.
    pub exclude: Vec<String>,
    /// Include dot-files and dot-directories.
    pub include_hidden: bool,
    /// Follow symlinks. Walk loops are rejected, not silently skipped.
    pub follow_symlinks: bool,
}

/// Snapshot metadata persisted as `snapshot.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_name: String,
    pub schema_version: u32,
    pub producer: Producer,
    pub snapshot_id: String,
    pub created_at: String,
    pub source: SourceInfo,
    pub file_count: usize,
    pub total_bytes: u64,
    pub config: SnapshotConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SkippedFile>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub include_hidden: bool,
    pub follow_symlinks: bool,
}

/// A file the walk skipped, recorded for observability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Builds immutable snapshots from directory sources.
pub struct SnapshotBuilder<'a> {
    root: &'a StoreRoot,
    cas: ObjectStore,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        Self {
            root,
            cas: ObjectStore::new(root),
        }
    }

    /// Snapshot `source_dir`, returning the `snapshot_id`.
    ///
    /// The id is the SHA-256 of the serialized canonical file index, so
    /// re-snapshotting unchanged input is idempotent: the existing snapshot
    /// is returned untouched.
    pub fn build(&self, source_dir: &Path, options: &SnapshotOptions) -> SnapshotResult<String> {
        if !source_dir.is_dir() {
            return Err(SnapshotError::NotADirectory(source_dir.to_path_buf()));
        }

        let include = build_glob_set(&options.include)?;
        let exclude = build_glob_set(&options.exclude)?;

        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        let mut total_bytes = 0u64;

        for item in walk(source_dir, options) {
            let dir_entry = match item {
                Ok(e) => e,
                Err(err) => {
                    if err.loop_ancestor().is_some() {
                        let at = err.path().unwrap_or(source_dir).to_path_buf();
                        return Err(SnapshotError::WalkLoop(at));
                    }
                    return Err(SnapshotError::Io(err.into()));
                }
            };
            if !dir_entry.file_type().is_file() {
                continue;
            }

            let rel = dir_entry
                .path()
                .strip_prefix(source_dir)
                .expect("walk stays under the source dir");
            let Some(rel_str) = rel.to_str() else {
                warnings.push(SkippedFile {
                    path: rel.to_string_lossy().into_owned(),
                    reason: "non-utf8 path".to_string(),
                });
                continue;
            };

            let (path, path_key) = match cbpath::canonicalize(rel_str) {
                Ok(pair) => pair,
                Err(e) => {
                    warnings.push(SkippedFile {
                        path: rel_str.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !include.is_empty() && !include.is_match(&path) {
                continue;
            }
            if exclude.is_match(&path) {
                continue;
            }

            let data = match fs::read(dir_entry.path()) {
                Ok(data) => data,
                Err(e) => {
                    warnings.push(SkippedFile {
                        path,
                        reason: format!("unreadable: {e}"),
                    });
                    continue;
                }
            };
            let object = self.cas.put(&data)?;
            total_bytes += data.len() as u64;

            entries.push(FileEntry {
                schema_version: SCHEMA_VERSION,
                lang_hint: detect_lang_hint(&path).map(str::to_string),
                mode: file_mode(&dir_entry),
                path,
                path_key,
                object,
                size: data.len() as u64,
            });
        }

        cbpath::sort_canonical(&mut entries, |e| &e.path_key);
        check_collisions(&entries)?;

        let index_bytes = serialize_index(&entries)?;
        let snapshot_id = ObjectId::from_bytes(&index_bytes).to_hex();

        // Idempotent rebuild: the id is derived from content, so an
        // existing directory under this id already holds this snapshot.
        let snapshot_dir = self.root.snapshot_dir(&snapshot_id);
        if self.root.snapshot_meta_path(&snapshot_id).exists() {
            tracing::debug!(snapshot_id, "snapshot already exists");
            return Ok(snapshot_id);
        }

        fs::create_dir_all(&snapshot_dir)?;
        fsio::atomic_write(&self.root.file_index_path(&snapshot_id), &index_bytes)?;

        let meta = SnapshotMeta {
            schema_name: SCHEMA_SNAPSHOT.to_string(),
            schema_version: SCHEMA_VERSION,
            producer: Producer::current(),
            snapshot_id: snapshot_id.clone(),
            created_at: cb_types::time::utc_now(),
            source: SourceInfo {
                source_type: "directory".to_string(),
                path: source_dir.to_string_lossy().into_owned(),
            },
            file_count: entries.len(),
            total_bytes,
            config: SnapshotConfig {
                include_hidden: options.include_hidden,
                follow_symlinks: options.follow_symlinks,
            },
            warnings,
        };
        fsio::atomic_write_json(&self.root.snapshot_meta_path(&snapshot_id), &meta)?;

        tracing::debug!(snapshot_id, files = entries.len(), "snapshot built");
        Ok(snapshot_id)
    }
}

fn walk(
    source_dir: &Path,
    options: &SnapshotOptions,
) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    let include_hidden = options.include_hidden;
    WalkDir::new(source_dir)
        .follow_links(options.follow_symlinks)
        .into_iter()
        .filter_entry(move |e| {
            if include_hidden || e.depth() == 0 {
                return true;
            }
            !e.file_name().to_string_lossy().starts_with('.')
        })
}

fn build_glob_set(patterns: &[String]) -> SnapshotResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| SnapshotError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SnapshotError::Serialization(e.to_string()))
}

#[cfg(unix)]
fn file_mode(entry: &walkdir::DirEntry) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    entry.metadata().ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_entry: &walkdir::DirEntry) -> Option<u32> {
    None
}

/// Entries are already canonically sorted; a duplicate `path_key` means two
/// paths that collapse to the same name on a case-insensitive filesystem.
fn check_collisions(entries: &[FileEntry]) -> SnapshotResult<()> {
    for pair in entries.windows(2) {
        if pair[0].path_key == pair[1].path_key {
            return Err(SnapshotError::PathCollision {
                key: pair[0].path_key.clone(),
                paths: (pair[0].path.clone(), pair[1].path.clone()),
            });
        }
    }
    Ok(())
}

fn serialize_index(entries: &[FileEntry]) -> SnapshotResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for entry in entries {
        let line = serde_json::to_vec(entry)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&line);
        bytes.push(b'\n');
    }
    Ok(bytes)
}
