//! Large-payload chunking through the CAS.
//!
//! Payloads up to [`CHUNK_THRESHOLD`] are stored directly. Anything larger
//! is split into [`CHUNK_SIZE`] pieces, each stored as its own object, and
//! described by a [`ChunkManifest`] object; the output record then points
//! at the manifest with `format = "chunks/v1"`. Reading is symmetric: bytes
//! that parse as a manifest are reassembled, anything else is returned
//! as-is.

use cb_store::ObjectStore;
use cb_types::schema::{SCHEMA_CHUNKS, SCHEMA_VERSION};
use cb_types::{ObjectId, OutputKind};
use serde::{Deserialize, Serialize};

use crate::error::{OutputError, OutputResult};

/// Payloads at or below this many bytes are stored directly. One byte more
/// chunks.
pub const CHUNK_THRESHOLD: usize = 1024 * 1024;

/// Size of each chunk object.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Format tag on records whose `object` points at a manifest.
pub const CHUNKED_FORMAT: &str = "chunks/v1";

/// CAS object enumerating the chunks of a logically larger payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub schema_name: String,
    pub schema_version: u32,
    pub kind: OutputKind,
    /// The format of the reassembled payload (e.g. `json`).
    pub format: String,
    pub chunks: Vec<ObjectId>,
    pub total_bytes: u64,
}

/// Store a payload, chunking if it exceeds the threshold.
///
/// Returns the object to reference from the record and the record's
/// `format` field: the payload's own format when stored directly, or
/// `chunks/v1` when a manifest was written.
pub fn store_payload(
    cas: &ObjectStore,
    kind: &OutputKind,
    format: &str,
    bytes: &[u8],
    threshold: usize,
    chunk_size: usize,
) -> OutputResult<(ObjectId, String)> {
    if bytes.len() <= threshold {
        let id = cas.put(bytes)?;
        return Ok((id, format.to_string()));
    }

    let mut chunks = Vec::new();
    for piece in bytes.chunks(chunk_size) {
        chunks.push(cas.put(piece)?);
    }

    let manifest = ChunkManifest {
        schema_name: SCHEMA_CHUNKS.to_string(),
        schema_version: SCHEMA_VERSION,
        kind: kind.clone(),
        format: format.to_string(),
        chunks,
        total_bytes: bytes.len() as u64,
    };
    let manifest_bytes =
        serde_json::to_vec(&manifest).map_err(|e| OutputError::Serialization(e.to_string()))?;
    let manifest_id = cas.put(&manifest_bytes)?;

    tracing::debug!(
        manifest = %manifest_id.short_hex(),
        chunks = manifest.chunks.len(),
        total_bytes = manifest.total_bytes,
        "chunked payload stored"
    );
    Ok((manifest_id, CHUNKED_FORMAT.to_string()))
}

/// Load a payload, reassembling chunked objects transparently.
pub fn load_payload(cas: &ObjectStore, object: &ObjectId) -> OutputResult<Vec<u8>> {
    let bytes = cas.get(object)?;
    let Some(manifest) = parse_manifest(&bytes) else {
        return Ok(bytes);
    };

    let mut assembled = Vec::with_capacity(manifest.total_bytes as usize);
    for chunk in &manifest.chunks {
        assembled.extend_from_slice(&cas.get(chunk)?);
    }
    Ok(assembled)
}

/// Parse bytes as a chunk manifest if and only if they are one.
pub fn parse_manifest(bytes: &[u8]) -> Option<ChunkManifest> {
    let manifest: ChunkManifest = serde_json::from_slice(bytes).ok()?;
    (manifest.schema_name == SCHEMA_CHUNKS).then_some(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_store::StoreRoot;

    fn cas() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = StoreRoot::init(dir.path().join("store")).unwrap();
        let cas = ObjectStore::new(&root);
        (dir, cas)
    }

    #[test]
    fn small_payload_stores_directly() {
        let (_dir, cas) = cas();
        let (id, format) =
            store_payload(&cas, &OutputKind::Ast, "json", b"{\"a\":1}", CHUNK_THRESHOLD, CHUNK_SIZE)
                .unwrap();
        assert_eq!(format, "json");
        assert_eq!(load_payload(&cas, &id).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn threshold_boundary_does_not_chunk() {
        let (_dir, cas) = cas();
        let bytes = vec![0x41u8; 64];
        let (_, format) = store_payload(&cas, &OutputKind::Ast, "json", &bytes, 64, 16).unwrap();
        assert_eq!(format, "json");
    }

    #[test]
    fn one_byte_over_threshold_chunks() {
        let (_dir, cas) = cas();
        let bytes = vec![0x41u8; 65];
        let (id, format) = store_payload(&cas, &OutputKind::Ast, "json", &bytes, 64, 16).unwrap();
        assert_eq!(format, CHUNKED_FORMAT);

        let manifest = parse_manifest(&cas.get(&id).unwrap()).expect("manifest");
        assert_eq!(manifest.total_bytes, 65);
        assert_eq!(manifest.chunks.len(), 5); // 4 * 16 + 1
        assert_eq!(manifest.format, "json");
    }

    #[test]
    fn chunked_roundtrip_reassembles_exactly() {
        let (_dir, cas) = cas();
        let bytes: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let (id, _) = store_payload(&cas, &OutputKind::Ast, "bin", &bytes, 1024, 1000).unwrap();
        assert_eq!(load_payload(&cas, &id).unwrap(), bytes);
    }

    #[test]
    fn chunk_sizes_sum_to_total() {
        let (_dir, cas) = cas();
        let bytes = vec![7u8; 2500];
        let (id, _) = store_payload(&cas, &OutputKind::Ast, "bin", &bytes, 1000, 1000).unwrap();
        let manifest = parse_manifest(&cas.get(&id).unwrap()).unwrap();
        let sum: u64 = manifest
            .chunks
            .iter()
            .map(|c| cas.get(c).unwrap().len() as u64)
            .sum();
        assert_eq!(sum, manifest.total_bytes);
    }

    #[test]
    fn non_manifest_bytes_load_verbatim() {
        let (_dir, cas) = cas();
        // JSON that is not a manifest must not be mistaken for one.
        let id = cas.put(b"{\"schema_name\":\"codebatch.snapshot\"}").unwrap();
        let loaded = load_payload(&cas, &id).unwrap();
        assert_eq!(loaded, b"{\"schema_name\":\"codebatch.snapshot\"}");
    }
}
