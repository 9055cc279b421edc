//! Output records, shard output indexes, and chunk manifests.
//!
//! A shard's `outputs.index.jsonl` is its complete semantic truth. Records
//! share a header (`schema_version`, ids, `path`, `kind`, `ts`) plus
//! kind-specific payload fields; the file is only ever written as a whole
//! via tmp-rename, never appended after commit.
//!
//! # Key Types
//!
//! - [`OutputRecord`] — One committed line of an outputs index
//! - [`OutputDraft`] — An executor-emitted record before the runner stamps it
//! - [`ChunkManifest`] — CAS object describing a payload split into chunks

pub mod chunk;
pub mod error;
pub mod jsonl;
pub mod record;

pub use chunk::{load_payload, store_payload, ChunkManifest, CHUNK_SIZE, CHUNK_THRESHOLD};
pub use error::{OutputError, OutputResult};
pub use record::{OutputDraft, OutputRecord, RecordHeader};
