use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Content-addressed identifier for any stored object.
///
/// An `ObjectId` is the SHA-256 hash of an object's bytes. Identical content
/// always produces the same `ObjectId`, making objects deduplicatable and
/// verifiable. The canonical text form is `sha256:<64 hex chars>`, which is
/// how the id appears in every persisted JSON record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Compute an `ObjectId` by hashing raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create an `ObjectId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded hash, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex form (first 8 characters), for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Canonical object reference: `sha256:<hex>`.
    pub fn to_ref(&self) -> String {
        format!("sha256:{}", self.to_hex())
    }

    /// Parse from a bare 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Parse a canonical reference (`sha256:<hex>`) or a bare hex string.
    pub fn parse_ref(s: &str) -> Result<Self, TypeError> {
        match s.split_once(':') {
            Some(("sha256", hex)) => Self::from_hex(hex),
            Some((algo, _)) => Err(TypeError::UnsupportedAlgorithm(algo.to_string())),
            None => Self::from_hex(s),
        }
    }

    /// The two-level directory prefix pair for the CAS layout
    /// (`objects/sha256/<aa>/<bb>/<hex>`).
    pub fn dir_prefixes(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..4].to_string())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ref())
    }
}

// Serialized as the canonical reference string so JSONL records read as
// "object":"sha256:<hex>".
impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_ref())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_ref(&s).map_err(D::Error::custom)
    }
}
