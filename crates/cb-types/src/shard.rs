use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Number of shards a task's file set is partitioned into.
pub const SHARD_COUNT: usize = 256;

/// One of 256 deterministic partitions of a task's input file set.
///
/// A file belongs to the shard named by the first hex byte pair of
/// `SHA-256(path_key)`, so the same snapshot always partitions the same
/// way. Shard ids render as two lowercase hex characters (`00`–`ff`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(u8);

impl ShardId {
    /// The shard a `path_key` hashes into.
    pub fn of_path_key(path_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path_key.as_bytes());
        let digest = hasher.finalize();
        Self(digest[0])
    }

    /// All 256 shard ids in order.
    pub fn all() -> impl Iterator<Item = ShardId> {
        (0u8..=255).map(ShardId)
    }

    /// The raw shard byte.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Debug for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardId({:02x})", self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl FromStr for ShardId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 {
            return Err(TypeError::InvalidLength {
                expected: 2,
                actual: s.len(),
            });
        }
        let byte = u8::from_str_radix(s, 16).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(byte))
    }
}

impl Serialize for ShardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharding_is_deterministic() {
        let a = ShardId::of_path_key("src/main.rs");
        let b = ShardId::of_path_key("src/main.rs");
        assert_eq!(a, b);
    }

    #[test]
    fn all_yields_256_distinct_shards() {
        let shards: Vec<ShardId> = ShardId::all().collect();
        assert_eq!(shards.len(), SHARD_COUNT);
        assert_eq!(shards.first().unwrap().to_string(), "00");
        assert_eq!(shards.last().unwrap().to_string(), "ff");
    }

    #[test]
    fn display_parse_roundtrip() {
        for shard in ShardId::all() {
            let parsed: ShardId = shard.to_string().parse().unwrap();
            assert_eq!(shard, parsed);
        }
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("g0".parse::<ShardId>().is_err());
        assert!("abc".parse::<ShardId>().is_err());
        assert!("".parse::<ShardId>().is_err());
    }

    #[test]
    fn shard_matches_leading_digest_byte() {
        let key = "lib/util.py";
        let digest = sha2::Sha256::digest(key.as_bytes());
        assert_eq!(ShardId::of_path_key(key).as_u8(), digest[0]);
    }
}
