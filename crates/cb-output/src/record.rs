use std::collections::BTreeMap;

use cb_types::{ObjectId, OutputKind, Severity, ShardId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OutputError, OutputResult};

/// Kind-specific payload fields shared by drafts and committed records.
///
/// Records are a tagged shape: `kind` selects which of these fields are
/// required; everything else stays `None` and is omitted from the JSON.
/// Unknown fields found on disk are preserved in `extra` so readers
/// tolerate newer writers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// An output record as emitted by an executor, before the runner stamps the
/// batch/task/shard header and `ts`.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDraft {
    pub path: String,
    pub kind: OutputKind,
    pub payload: Payload,
}

impl OutputDraft {
    pub fn new(path: impl Into<String>, kind: OutputKind) -> Self {
        Self {
            path: path.into(),
            kind,
            payload: Payload::default(),
        }
    }

    /// An `ast` record pointing at stored bytes.
    pub fn ast(path: impl Into<String>, object: ObjectId, format: impl Into<String>) -> Self {
        let mut draft = Self::new(path, OutputKind::Ast);
        draft.payload.object = Some(object);
        draft.payload.format = Some(format.into());
        draft
    }

    /// A `diagnostic` record.
    pub fn diagnostic(
        path: impl Into<String>,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        let mut draft = Self::new(path, OutputKind::Diagnostic);
        draft.payload.severity = Some(severity);
        draft.payload.code = Some(code.into());
        draft.payload.message = Some(message.into());
        draft.payload.line = Some(line);
        draft.payload.column = Some(column);
        draft
    }

    /// A `metric` record.
    pub fn metric(path: impl Into<String>, metric: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut draft = Self::new(path, OutputKind::Metric);
        draft.payload.metric = Some(metric.into());
        draft.payload.value = Some(value.into());
        draft
    }

    /// A `symbol` record.
    pub fn symbol(
        path: impl Into<String>,
        name: impl Into<String>,
        symbol_type: impl Into<String>,
        line: u32,
    ) -> Self {
        let mut draft = Self::new(path, OutputKind::Symbol);
        draft.payload.name = Some(name.into());
        draft.payload.symbol_type = Some(symbol_type.into());
        draft.payload.line = Some(line);
        draft
    }

    /// An `edge` record.
    pub fn edge(
        path: impl Into<String>,
        edge_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let mut draft = Self::new(path, OutputKind::Edge);
        draft.payload.edge_type = Some(edge_type.into());
        draft.payload.target = Some(target.into());
        draft
    }

    /// Validate that the fields this record's kind requires are present.
    /// Writers call this before serializing; malformed records never reach
    /// the outputs index.
    pub fn validate(&self) -> OutputResult<()> {
        let missing = |field| OutputError::MissingField {
            kind: self.kind.clone(),
            field,
        };
        match self.kind {
            OutputKind::Ast => {
                self.payload.object.ok_or_else(|| missing("object"))?;
            }
            OutputKind::Diagnostic => {
                self.payload.severity.ok_or_else(|| missing("severity"))?;
                self.payload.code.as_ref().ok_or_else(|| missing("code"))?;
                self.payload.message.as_ref().ok_or_else(|| missing("message"))?;
            }
            OutputKind::Metric => {
                self.payload.metric.as_ref().ok_or_else(|| missing("metric"))?;
                self.payload.value.as_ref().ok_or_else(|| missing("value"))?;
            }
            OutputKind::Symbol => {
                self.payload.name.as_ref().ok_or_else(|| missing("name"))?;
            }
            OutputKind::Edge => {
                self.payload.edge_type.as_ref().ok_or_else(|| missing("edge_type"))?;
                self.payload.target.as_ref().ok_or_else(|| missing("target"))?;
            }
            OutputKind::Other(_) => {}
        }
        Ok(())
    }
}

/// The header fields the runner stamps onto every committed record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub schema_version: u32,
    pub snapshot_id: String,
    pub batch_id: String,
    pub task_id: String,
    pub shard_id: ShardId,
    pub ts: String,
}

/// One committed line of a shard's `outputs.index.jsonl`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub path: String,
    pub kind: OutputKind,
    #[serde(flatten)]
    pub payload: Payload,
}

impl OutputRecord {
    /// Stamp a draft with its header, producing a committed record.
    pub fn from_draft(draft: OutputDraft, header: RecordHeader) -> Self {
        Self {
            header,
            path: draft.path,
            kind: draft.kind,
            payload: draft.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_constructor_validates() {
        let draft = OutputDraft::diagnostic("a.py", Severity::Warning, "L101", "Unused import 'sys'", 1, 1);
        draft.validate().unwrap();
    }

    #[test]
    fn missing_required_field_is_caught() {
        let mut draft = OutputDraft::new("a.py", OutputKind::Diagnostic);
        draft.payload.severity = Some(Severity::Error);
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, OutputError::MissingField { field: "code", .. }));
    }

    #[test]
    fn unknown_kind_has_no_required_fields() {
        OutputDraft::new("a.py", OutputKind::from("coverage"))
            .validate()
            .unwrap();
    }

    #[test]
    fn record_serializes_flat() {
        let draft = OutputDraft::metric("a.py", "complexity", 1);
        let record = OutputRecord::from_draft(
            draft,
            RecordHeader {
                schema_version: 1,
                snapshot_id: "snap".into(),
                batch_id: "batch".into(),
                task_id: "02_analyze".into(),
                shard_id: "0a".parse().unwrap(),
                ts: "2026-02-02T12:00:00Z".into(),
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "metric");
        assert_eq!(json["metric"], "complexity");
        assert_eq!(json["value"], 1);
        assert_eq!(json["shard_id"], "0a");
        // Absent payload fields do not appear at all.
        assert!(json.get("severity").is_none());
    }

    #[test]
    fn unknown_fields_survive_a_roundtrip() {
        let line = r#"{"schema_version":1,"snapshot_id":"s","batch_id":"b",
            "task_id":"t","shard_id":"00","ts":"2026-02-02T12:00:00Z",
            "path":"a.py","kind":"diagnostic","severity":"warning",
            "code":"L001","message":"m","line":1,"column":2,
            "novel_field":"kept"}"#;
        let record: OutputRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.payload.extra["novel_field"], "kept");
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["novel_field"], "kept");
    }
}
