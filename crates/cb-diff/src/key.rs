use cb_output::OutputRecord;
use cb_types::OutputKind;

/// One component of a canonical key. Numeric components compare as
/// numbers, so `line 9` sorts before `line 10`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Text(String),
    Number(u64),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        Self::Number(n as u64)
    }
}

/// The tuple of fields that identifies "the same record" across runs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(Vec<KeyPart>);

/// Canonical key per kind:
///
/// | kind       | key fields                          |
/// |------------|-------------------------------------|
/// | diagnostic | kind, path, line, column, code      |
/// | metric     | kind, path, metric                  |
/// | symbol     | kind, path, name, line              |
/// | ast        | kind, path, object                  |
/// | edge       | kind, path, edge_type, target       |
/// | other      | kind, path                          |
pub fn canonical_key(record: &OutputRecord) -> CanonicalKey {
    let mut parts: Vec<KeyPart> = vec![
        record.kind.as_str().into(),
        record.path.as_str().into(),
    ];
    match record.kind {
        OutputKind::Diagnostic => {
            parts.push(record.payload.line.unwrap_or(0).into());
            parts.push(record.payload.column.unwrap_or(0).into());
            parts.push(record.payload.code.as_deref().unwrap_or("").into());
        }
        OutputKind::Metric => {
            parts.push(record.payload.metric.as_deref().unwrap_or("").into());
        }
        OutputKind::Symbol => {
            parts.push(record.payload.name.as_deref().unwrap_or("").into());
            parts.push(record.payload.line.unwrap_or(0).into());
        }
        OutputKind::Ast => {
            let object = record
                .payload
                .object
                .map(|o| o.to_ref())
                .unwrap_or_default();
            parts.push(KeyPart::Text(object));
        }
        OutputKind::Edge => {
            parts.push(record.payload.edge_type.as_deref().unwrap_or("").into());
            parts.push(record.payload.target.as_deref().unwrap_or("").into());
        }
        OutputKind::Other(_) => {}
    }
    CanonicalKey(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_output::{OutputDraft, RecordHeader};
    use cb_types::{ObjectId, Severity};

    fn header() -> RecordHeader {
        RecordHeader {
            schema_version: 1,
            snapshot_id: "s".into(),
            batch_id: "b".into(),
            task_id: "t".into(),
            shard_id: "00".parse().unwrap(),
            ts: "2026-02-02T12:00:00Z".into(),
        }
    }

    #[test]
    fn diagnostic_keys_ignore_message_and_header() {
        let a = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L101", "one wording", 1, 1),
            header(),
        );
        let mut b = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Error, "L101", "another wording", 1, 1),
            RecordHeader {
                batch_id: "other-batch".into(),
                ..header()
            },
        );
        b.header.ts = "2030-01-01T00:00:00Z".into();
        assert_eq!(canonical_key(&a), canonical_key(&b));
    }

    #[test]
    fn diagnostic_keys_distinguish_position_and_code() {
        let base = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L101", "m", 1, 1),
            header(),
        );
        let moved = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L101", "m", 2, 1),
            header(),
        );
        let recoded = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L102", "m", 1, 1),
            header(),
        );
        assert_ne!(canonical_key(&base), canonical_key(&moved));
        assert_ne!(canonical_key(&base), canonical_key(&recoded));
    }

    #[test]
    fn metric_key_is_path_and_name() {
        let a = OutputRecord::from_draft(OutputDraft::metric("a.py", "complexity", 1), header());
        let b = OutputRecord::from_draft(OutputDraft::metric("a.py", "complexity", 99), header());
        let c = OutputRecord::from_draft(OutputDraft::metric("a.py", "lines", 1), header());
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_ne!(canonical_key(&a), canonical_key(&c));
    }

    #[test]
    fn ast_key_includes_object() {
        let a = OutputRecord::from_draft(
            OutputDraft::ast("a.py", ObjectId::from_bytes(b"one"), "json"),
            header(),
        );
        let b = OutputRecord::from_draft(
            OutputDraft::ast("a.py", ObjectId::from_bytes(b"two"), "json"),
            header(),
        );
        assert_ne!(canonical_key(&a), canonical_key(&b));
    }

    #[test]
    fn numeric_parts_sort_numerically() {
        let line9 = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L1", "m", 9, 1),
            header(),
        );
        let line10 = OutputRecord::from_draft(
            OutputDraft::diagnostic("a.py", Severity::Warning, "L1", "m", 10, 1),
            header(),
        );
        assert!(canonical_key(&line9) < canonical_key(&line10));
    }
}
