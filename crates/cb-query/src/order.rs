//! Canonical result ordering.
//!
//! Readers impose the total order `(path_key ASC, kind ASC, line ASC,
//! column ASC, code ASC)` so query results are deterministic no matter
//! which shards produced them or in what order they were scanned.

use cb_output::OutputRecord;
use cb_types::path::compute_path_key;

type SortKey = (String, String, u32, u32, String);

fn sort_key(record: &OutputRecord) -> SortKey {
    (
        compute_path_key(&record.path),
        record.kind.as_str().to_string(),
        record.payload.line.unwrap_or(0),
        record.payload.column.unwrap_or(0),
        record.payload.code.clone().unwrap_or_default(),
    )
}

/// Stable sort into canonical order; equal keys keep scan order.
pub fn canonical_sort_records(records: &mut [OutputRecord]) {
    records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_output::{OutputDraft, RecordHeader};
    use cb_types::Severity;

    fn diag(path: &str, line: u32, column: u32, code: &str) -> OutputRecord {
        OutputRecord::from_draft(
            OutputDraft::diagnostic(path, Severity::Warning, code, "m", line, column),
            RecordHeader {
                schema_version: 1,
                snapshot_id: "s".into(),
                batch_id: "b".into(),
                task_id: "t".into(),
                shard_id: "00".parse().unwrap(),
                ts: String::new(),
            },
        )
    }

    #[test]
    fn sorts_by_path_then_position_then_code() {
        let mut records = vec![
            diag("b.py", 1, 1, "L001"),
            diag("a.py", 2, 1, "L001"),
            diag("a.py", 1, 5, "L002"),
            diag("a.py", 1, 5, "L001"),
        ];
        canonical_sort_records(&mut records);

        let view: Vec<(String, u32, String)> = records
            .iter()
            .map(|r| {
                (
                    r.path.clone(),
                    r.payload.line.unwrap(),
                    r.payload.code.clone().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            view,
            vec![
                ("a.py".into(), 1, "L001".into()),
                ("a.py".into(), 1, "L002".into()),
                ("a.py".into(), 2, "L001".into()),
                ("b.py".into(), 1, "L001".into()),
            ]
        );
    }

    #[test]
    fn path_ordering_uses_path_key() {
        let mut records = vec![diag("B.py", 1, 1, "L001"), diag("a.py", 1, 1, "L001")];
        canonical_sort_records(&mut records);
        // "a.py" < "b.py" under the lowercase key, despite 'B' < 'a' in ASCII.
        assert_eq!(records[0].path, "a.py");
    }
}
