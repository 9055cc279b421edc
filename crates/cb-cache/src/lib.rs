//! Derived LMDB acceleration cache.
//!
//! The cache is derived, rebuildable, never truth. It mirrors the
//! authoritative JSONL sources into an LMDB environment at `indexes/lmdb/`
//! and is consulted only when its recorded source fingerprint matches a
//! fresh hash of those sources; on any mismatch, corruption, or absence,
//! queries silently fall back to the scan engine. Deleting `indexes/`
//! loses nothing.
//!
//! # Key Types
//!
//! - [`build_index`] — Ingest authoritative sources into a fresh cache
//! - [`CacheMeta`] — `cache_meta.json`: fingerprint + source inventory
//! - [`CacheReader`] — Queries against a validated cache
//! - [`QueryRouter`] — Routes each query to cache or scan, never both

pub mod build;
pub mod env;
pub mod error;
pub mod key;
pub mod meta;
pub mod reader;
pub mod router;

pub use build::{build_index, BuildStats};
pub use env::CacheEnv;
pub use error::{CacheError, CacheResult};
pub use meta::{compute_fingerprint, CacheMeta};
pub use reader::CacheReader;
pub use router::{QueryRouter, QuerySource};
