//! Immutable source-tree snapshots.
//!
//! A snapshot freezes a directory at a point in time: every file's bytes go
//! into the CAS, the file list becomes `files.index.jsonl` in canonical
//! order, and the `snapshot_id` is the SHA-256 of that serialized index.
//! Building the same tree twice therefore yields the same id and a
//! byte-identical index, and a snapshot is never mutated once written.
//!
//! # Key Types
//!
//! - [`SnapshotBuilder`] — Walks a tree and materializes the snapshot
//! - [`SnapshotOptions`] — Include/exclude globs, hidden files, symlinks
//! - [`FileEntry`] — One row of the file index
//! - [`index`] — Readers over `files.index.jsonl`

pub mod builder;
pub mod entry;
pub mod error;
pub mod index;

pub use builder::{SnapshotBuilder, SnapshotMeta, SnapshotOptions};
pub use entry::FileEntry;
pub use error::{SnapshotError, SnapshotResult};
