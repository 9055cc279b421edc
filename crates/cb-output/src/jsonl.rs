//! Whole-file JSONL commit and read for shard output indexes.
//!
//! An outputs index is only ever replaced as a complete file (tmp-rename);
//! readers therefore always see a fully formed index, with no locking.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use cb_store::fsio;

use crate::error::{OutputError, OutputResult};
use crate::record::OutputRecord;

/// Serialize records one-per-line, compact JSON.
pub fn serialize_records(records: &[OutputRecord]) -> OutputResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for record in records {
        let line =
            serde_json::to_vec(record).map_err(|e| OutputError::Serialization(e.to_string()))?;
        bytes.extend_from_slice(&line);
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Commit a complete outputs index atomically.
pub fn write_records(path: &Path, records: &[OutputRecord]) -> OutputResult<()> {
    let bytes = serialize_records(records)?;
    fsio::atomic_write(path, &bytes)?;
    tracing::debug!(path = %path.display(), count = records.len(), "outputs index committed");
    Ok(())
}

/// Read an outputs index. A missing file reads as empty: a shard that has
/// not committed yet simply has no truth.
pub fn read_records(path: &Path) -> OutputResult<Vec<OutputRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: OutputRecord =
            serde_json::from_str(&line).map_err(|e| OutputError::Serialization(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{OutputDraft, RecordHeader};
    use cb_types::Severity;

    fn header() -> RecordHeader {
        RecordHeader {
            schema_version: 1,
            snapshot_id: "snap".into(),
            batch_id: "batch".into(),
            task_id: "04_lint".into(),
            shard_id: "1f".parse().unwrap(),
            ts: "2026-02-02T12:00:00Z".into(),
        }
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.index.jsonl");

        let records = vec![
            OutputRecord::from_draft(
                OutputDraft::diagnostic("a.py", Severity::Warning, "L001", "Trailing whitespace", 3, 7),
                header(),
            ),
            OutputRecord::from_draft(OutputDraft::metric("a.py", "complexity", 2), header()),
        ];
        write_records(&path, &records).unwrap();

        let back = read_records(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = read_records(&dir.path().join("absent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn rewrite_replaces_not_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.index.jsonl");

        let first = vec![OutputRecord::from_draft(
            OutputDraft::metric("a.py", "complexity", 1),
            header(),
        )];
        write_records(&path, &first).unwrap();
        write_records(&path, &first).unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.index.jsonl");
        let record = OutputRecord::from_draft(OutputDraft::metric("a.py", "n", 0), header());
        let mut bytes = serialize_records(&[record]).unwrap();
        bytes.extend_from_slice(b"\n\n");
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn malformed_line_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.index.jsonl");
        std::fs::write(&path, b"{not json}\n").unwrap();
        assert!(matches!(
            read_records(&path),
            Err(OutputError::Serialization(_))
        ));
    }
}
