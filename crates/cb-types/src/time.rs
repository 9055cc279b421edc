//! Timestamp helpers.
//!
//! All `ts` fields are RFC3339 UTC with a `Z` suffix and second precision,
//! e.g. `2026-02-02T12:00:00Z`. Timestamps are stamped by the runner, never
//! by executors, and are treated as ephemeral by the diff engine and the
//! determinism tests.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as an RFC3339 string with `Z` suffix.
pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact UTC stamp for generated ids: `YYYYMMDD-HHMMSS`.
pub fn utc_id_stamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_now_has_z_suffix() {
        let ts = utc_now();
        assert!(ts.ends_with('Z'), "got {ts}");
        assert_eq!(ts.len(), "2026-02-02T12:00:00Z".len());
    }

    #[test]
    fn id_stamp_shape() {
        let stamp = utc_id_stamp();
        assert_eq!(stamp.len(), "20260202-120000".len());
        assert_eq!(stamp.as_bytes()[8], b'-');
    }
}
