//! Advisory single-writer lock on the store root.
//!
//! Two processes running against the same store concurrently is undefined
//! behavior; the batch runner takes this lock to refuse a second writer
//! outright rather than interleave. Readers never take it.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{RunnerError, RunnerResult};

const LOCK_FILE: &str = ".writer.lock";

/// Exclusive advisory lock, released on drop.
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Try to acquire the writer lock; fails fast with
    /// [`RunnerError::StoreLocked`] if another process holds it.
    pub fn acquire(store_root: &Path) -> RunnerResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(store_root.join(LOCK_FILE))?;
        file.try_lock_exclusive().map_err(|_| RunnerError::StoreLocked)?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
