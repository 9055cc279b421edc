//! Store root layout and content-addressed object store.
//!
//! A CodeBatch store is a directory with a fixed layout:
//!
//! ```text
//! <store_root>/
//!   store.json       # store metadata
//!   objects/sha256/  # content-addressed objects (aa/bb/<hex>)
//!   snapshots/       # frozen input state
//!   batches/         # execution attempts
//!   indexes/         # derived acceleration, deletable at any time
//! ```
//!
//! # Key Types
//!
//! - [`StoreRoot`] — Validated handle on the layout; the single source of
//!   every path the substrate touches
//! - [`ObjectStore`] — Write-once CAS keyed by SHA-256, atomic inserts
//! - [`fsio`] — Atomic tmp-rename file replacement used by every writer

pub mod cas;
pub mod error;
pub mod fsio;
pub mod root;

pub use cas::ObjectStore;
pub use error::{StoreError, StoreResult};
pub use root::{StoreMeta, StoreRoot};
