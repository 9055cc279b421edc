//! Cache key and counter encodings.
//!
//! Keys are UTF-8 parts joined by the unit separator (0x1F) behind a `v1`
//! schema prefix. The delimiter never occurs in ids, paths, kinds, or
//! severities, so keys parse unambiguously and sort component-wise.
//! Counters are 8-byte big-endian u64 so they sort and compare as bytes.

/// Unit separator.
pub const DELIMITER: u8 = 0x1f;

/// Key schema prefix; bump together with the cache schema version.
pub const KEY_PREFIX: &str = "v1";

/// Join parts into a key: `v1␟part␟part…`.
pub fn make_key(parts: &[&str]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 * parts.len());
    key.extend_from_slice(KEY_PREFIX.as_bytes());
    for part in parts {
        key.push(DELIMITER);
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// A key that ends with the delimiter, for prefix scans over children.
pub fn make_prefix(parts: &[&str]) -> Vec<u8> {
    let mut key = make_key(parts);
    key.push(DELIMITER);
    key
}

/// Split a key back into its parts, dropping the version prefix.
pub fn parse_key(key: &[u8]) -> Vec<String> {
    let mut parts: Vec<String> = key
        .split(|b| *b == DELIMITER)
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect();
    if parts.first().map(String::as_str) == Some(KEY_PREFIX) {
        parts.remove(0);
    }
    parts
}

/// Encode a counter as 8-byte big-endian.
pub fn encode_counter(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode an 8-byte big-endian counter; short/garbled input reads as 0.
pub fn decode_counter(bytes: &[u8]) -> u64 {
    match <[u8; 8]>::try_from(bytes) {
        Ok(arr) => u64::from_be_bytes(arr),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        let key = make_key(&["snap", "batch", "task", "diagnostic", "a.py"]);
        assert_eq!(
            parse_key(&key),
            vec!["snap", "batch", "task", "diagnostic", "a.py"]
        );
    }

    #[test]
    fn key_uses_unit_separator() {
        let key = make_key(&["a", "b"]);
        assert_eq!(key, b"v1\x1fa\x1fb".to_vec());
    }

    #[test]
    fn prefix_is_a_strict_prefix_of_children() {
        let prefix = make_prefix(&["snap", "batch"]);
        let child = make_key(&["snap", "batch", "task"]);
        assert!(child.starts_with(&prefix));
        // but not of a sibling with a longer component
        let sibling = make_key(&["snap", "batchx", "task"]);
        assert!(!sibling.starts_with(&prefix));
    }

    #[test]
    fn counter_roundtrip() {
        for value in [0u64, 1, 255, 1 << 40, u64::MAX] {
            assert_eq!(decode_counter(&encode_counter(value)), value);
        }
    }

    #[test]
    fn counters_sort_as_bytes() {
        assert!(encode_counter(2) < encode_counter(10));
        assert!(encode_counter(255) < encode_counter(256));
    }

    #[test]
    fn garbled_counter_reads_zero() {
        assert_eq!(decode_counter(b"abc"), 0);
    }
}
