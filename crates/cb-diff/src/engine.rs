use std::collections::BTreeMap;

use cb_cache::QueryRouter;
use cb_output::OutputRecord;
use cb_query::QueryFilter;
use cb_store::StoreRoot;
use cb_types::OutputKind;
use serde_json::Value;

use crate::error::DiffResult;
use crate::key::{canonical_key, CanonicalKey};

/// Result of comparing two batches' outputs.
///
/// `changed` holds `(old, new)` pairs whose canonical keys match but whose
/// remaining fields differ. All three lists are sorted by canonical key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchDiff {
    pub added: Vec<OutputRecord>,
    pub removed: Vec<OutputRecord>,
    pub changed: Vec<(OutputRecord, OutputRecord)>,
}

impl BatchDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Fields dropped before comparison; they vary across runs without
/// changing what a record means.
const EPHEMERAL_FIELDS: [&str; 4] = ["ts", "run_id", "shard_id", "batch_id"];

/// Serialize a record and strip the ephemeral fields.
fn normalize(record: &OutputRecord) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        for field in EPHEMERAL_FIELDS {
            map.remove(field);
        }
    }
    value
}

/// Set-compare two record collections by canonical key.
///
/// Duplicate canonical keys within one collection collapse to the last
/// occurrence; the shard index keeps duplicates, the diff's set semantics
/// do not.
pub fn diff_records(old: &[OutputRecord], new: &[OutputRecord]) -> BatchDiff {
    let map_old = to_map(old);
    let map_new = to_map(new);

    let mut diff = BatchDiff::default();

    for (key, (record, normalized)) in &map_new {
        match map_old.get(key) {
            None => diff.added.push(record.clone()),
            Some((old_record, old_normalized)) => {
                if old_normalized != normalized {
                    diff.changed.push((old_record.clone(), record.clone()));
                }
            }
        }
    }
    for (key, (record, _)) in &map_old {
        if !map_new.contains_key(key) {
            diff.removed.push(record.clone());
        }
    }

    // BTreeMap iteration already yields canonical-key order for added and
    // changed; removed came from the old map in the same order.
    diff
}

fn to_map(records: &[OutputRecord]) -> BTreeMap<CanonicalKey, (OutputRecord, Value)> {
    records
        .iter()
        .map(|r| (canonical_key(r), (r.clone(), normalize(r))))
        .collect()
}

/// Compare the outputs of two batches, optionally restricted to one kind.
/// Reads route through the cache when one is valid for the batch.
pub fn diff_batches(
    root: &StoreRoot,
    batch_a: &str,
    batch_b: &str,
    kind: Option<OutputKind>,
) -> DiffResult<BatchDiff> {
    let filter = QueryFilter {
        kind,
        ..Default::default()
    };
    let router = QueryRouter::new(root);
    let (old, _) = router.query_outputs(batch_a, &filter)?;
    let (new, _) = router.query_outputs(batch_b, &filter)?;
    Ok(diff_records(&old, &new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_output::{OutputDraft, RecordHeader};
    use cb_types::Severity;

    fn header(batch: &str) -> RecordHeader {
        RecordHeader {
            schema_version: 1,
            snapshot_id: "s".into(),
            batch_id: batch.into(),
            task_id: "04_lint".into(),
            shard_id: "00".parse().unwrap(),
            ts: format!("2026-02-02T12:00:0{}Z", batch.len() % 10),
        }
    }

    fn diag(batch: &str, path: &str, line: u32, code: &str, severity: Severity) -> OutputRecord {
        OutputRecord::from_draft(
            OutputDraft::diagnostic(path, severity, code, "msg", line, 1),
            header(batch),
        )
    }

    #[test]
    fn identical_sets_diff_empty() {
        let a = vec![diag("a", "x.py", 1, "L101", Severity::Warning)];
        let b = vec![diag("b", "x.py", 1, "L101", Severity::Warning)];
        let diff = diff_records(&a, &b);
        assert!(diff.is_empty(), "{diff:?}");
    }

    #[test]
    fn ephemeral_fields_do_not_count_as_changes() {
        let mut a = vec![diag("a", "x.py", 1, "L101", Severity::Warning)];
        let mut b = vec![diag("b", "x.py", 1, "L101", Severity::Warning)];
        a[0].header.ts = "2020-01-01T00:00:00Z".into();
        b[0].header.ts = "2030-01-01T00:00:00Z".into();
        assert!(diff_records(&a, &b).is_empty());
    }

    #[test]
    fn added_and_removed() {
        let a = vec![diag("a", "x.py", 1, "L101", Severity::Warning)];
        let b = vec![diag("b", "y.py", 2, "L102", Severity::Warning)];
        let diff = diff_records(&a, &b);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.changed.is_empty());
        assert_eq!(diff.added[0].path, "y.py");
        assert_eq!(diff.removed[0].path, "x.py");
    }

    #[test]
    fn same_key_different_severity_is_changed() {
        let a = vec![diag("a", "x.py", 1, "L101", Severity::Warning)];
        let b = vec![diag("b", "x.py", 1, "L101", Severity::Error)];
        let diff = diff_records(&a, &b);
        assert_eq!(diff.changed.len(), 1);
        let (old, new) = &diff.changed[0];
        assert_eq!(old.payload.severity, Some(Severity::Warning));
        assert_eq!(new.payload.severity, Some(Severity::Error));
    }

    #[test]
    fn duplicates_collapse_under_set_semantics() {
        let a = vec![
            diag("a", "x.py", 1, "L101", Severity::Warning),
            diag("a", "x.py", 1, "L101", Severity::Warning),
        ];
        let b = vec![diag("b", "x.py", 1, "L101", Severity::Warning)];
        assert!(diff_records(&a, &b).is_empty());
    }

    #[test]
    fn results_sorted_by_canonical_key() {
        let a = Vec::new();
        let b = vec![
            diag("b", "z.py", 1, "L101", Severity::Warning),
            diag("b", "a.py", 5, "L101", Severity::Warning),
            diag("b", "a.py", 2, "L101", Severity::Warning),
        ];
        let diff = diff_records(&a, &b);
        let order: Vec<(String, u32)> = diff
            .added
            .iter()
            .map(|r| (r.path.clone(), r.payload.line.unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![("a.py".into(), 2), ("a.py".into(), 5), ("z.py".into(), 1)]
        );
    }

    #[test]
    fn metric_value_change_is_changed() {
        let a = vec![OutputRecord::from_draft(
            OutputDraft::metric("x.py", "complexity", 1),
            header("a"),
        )];
        let b = vec![OutputRecord::from_draft(
            OutputDraft::metric("x.py", "complexity", 3),
            header("b"),
        )];
        let diff = diff_records(&a, &b);
        assert_eq!(diff.changed.len(), 1);
    }
}
