use std::fs;
use std::path::PathBuf;

use cb_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::fsio;
use crate::root::StoreRoot;

/// Content-addressed object store over `objects/sha256/aa/bb/<hex>`.
///
/// Invariants:
/// - Add-only: no object is ever overwritten or removed.
/// - `put` is idempotent; if the target path exists it is left untouched.
///   Concurrent writers racing on the same content are benign because both
///   write identical bytes to the same content-addressed path.
/// - `get` verifies the SHA-256 of the bytes read; a mismatch is fatal
///   corruption, never silently returned.
#[derive(Clone, Debug)]
pub struct ObjectStore {
    objects_dir: PathBuf,
}

impl ObjectStore {
    pub fn new(root: &StoreRoot) -> Self {
        Self {
            objects_dir: root.objects_dir(),
        }
    }

    /// The on-disk path an object lives at (whether or not it exists).
    pub fn path_of(&self, id: &ObjectId) -> PathBuf {
        let (aa, bb) = id.dir_prefixes();
        self.objects_dir.join(aa).join(bb).join(id.to_hex())
    }

    /// Store bytes, returning their content-addressed id.
    pub fn put(&self, data: &[u8]) -> StoreResult<ObjectId> {
        let id = ObjectId::from_bytes(data);
        let path = self.path_of(&id);

        // Dedupe: content-addressing guarantees an existing file already
        // holds these exact bytes.
        if path.exists() {
            return Ok(id);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fsio::atomic_write(&path, data) {
            Ok(()) => {}
            // A concurrent writer may have renamed first; the object is
            // there either way.
            Err(_) if path.exists() => {}
            Err(e) => return Err(e),
        }

        tracing::debug!(object = %id.short_hex(), size = data.len(), "CAS put");
        Ok(id)
    }

    /// Whether an object exists in the store.
    pub fn has(&self, id: &ObjectId) -> bool {
        self.path_of(id).exists()
    }

    /// Read an object's bytes, verifying the content hash.
    pub fn get(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let path = self.path_of(id);
        if !path.exists() {
            return Err(StoreError::ObjectNotFound(*id));
        }
        let data = fs::read(&path)?;
        let actual = ObjectId::from_bytes(&data);
        if actual != *id {
            return Err(StoreError::Corrupt { id: *id, actual });
        }
        Ok(data)
    }
}
