//! Path canonicalization and `path_key` rules.
//!
//! Every file path stored in a snapshot is canonicalized: UTF-8, `/`
//! separators, no `.` or `..` segments, no absolute paths, no trailing
//! slash. The `path_key` is the NFC-normalized lowercase form and is the
//! sort key for all file and record listings.

use unicode_normalization::UnicodeNormalization;

use crate::error::TypeError;

/// Canonicalize a raw path and compute its `path_key`.
///
/// Returns `(path, path_key)` where `path` preserves the original casing
/// and `path_key` is the NFC lowercase form used for ordering, sharding,
/// and collision detection.
pub fn canonicalize(raw: &str) -> Result<(String, String), TypeError> {
    if raw.is_empty() {
        return Err(TypeError::invalid_path(raw, "empty path"));
    }
    if raw.chars().any(|c| c.is_control()) {
        return Err(TypeError::invalid_path(raw, "contains control characters"));
    }

    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(TypeError::invalid_path(raw, "absolute path"));
    }
    // Windows drive-letter absolute paths (C:/...).
    if normalized.len() >= 2 && normalized.as_bytes()[1] == b':' {
        return Err(TypeError::invalid_path(raw, "absolute path"));
    }

    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(TypeError::invalid_path(raw, "path is empty after normalization"));
    }

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(TypeError::invalid_path(raw, "empty path segment")),
            "." | ".." => {
                return Err(TypeError::invalid_path(raw, "relative path segment"));
            }
            other => segments.push(other),
        }
    }

    let path = segments.join("/");
    let path_key = compute_path_key(&path);
    Ok((path, path_key))
}

/// The `path_key` of an already-canonical path: NFC form, lowercased.
pub fn compute_path_key(path: &str) -> String {
    path.nfc().collect::<String>().to_lowercase()
}

/// Stable sort by `(path_key ASC, insertion_index ASC)`.
///
/// `key_of` extracts the `path_key` from an item; the sort is stable so
/// items with equal keys keep their input order.
pub fn sort_canonical<T, F>(items: &mut [T], key_of: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| key_of(a).cmp(key_of(b)));
}
