//! Diff engine: canonical-key comparison of two batches' outputs.
//!
//! Records are identified across batches by a kind-specific canonical key
//! and compared after dropping ephemeral fields (`ts`, `run_id`,
//! `shard_id`, `batch_id`). The result is pure set math: `{added, removed,
//! changed}` sorted by canonical key. On top of that, diagnostics classify
//! into regressions and improvements along the severity scale.
//!
//! # Key Types
//!
//! - [`canonical_key`] / [`CanonicalKey`] — Cross-batch record identity
//! - [`diff_batches`] / [`BatchDiff`] — Set comparison of two batches
//! - [`diff_diagnostics`] / [`DiagnosticDelta`] — Regression classification

pub mod delta;
pub mod engine;
pub mod error;
pub mod key;

pub use delta::{diff_diagnostics, DiagnosticDelta};
pub use engine::{diff_batches, diff_records, BatchDiff};
pub use error::{DiffError, DiffResult};
pub use key::{canonical_key, CanonicalKey};
