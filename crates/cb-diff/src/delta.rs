//! Regression and improvement classification for diagnostics.

use cb_output::OutputRecord;
use cb_store::StoreRoot;
use cb_types::{OutputKind, Severity};

use crate::engine::{diff_batches, BatchDiff};
use crate::error::DiffResult;

/// Diagnostics classified across two batches.
///
/// Regressions are added diagnostics plus changed ones whose severity
/// worsened on the ordered scale `info < warning < error`; improvements
/// mirror that (the removed or previously-worse record is reported).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticDelta {
    pub regressions: Vec<OutputRecord>,
    pub improvements: Vec<OutputRecord>,
    /// Changed pairs whose severity did not move (e.g. message wording).
    pub unchanged_severity: Vec<OutputRecord>,
}

impl DiagnosticDelta {
    pub fn is_clean(&self) -> bool {
        self.regressions.is_empty()
    }
}

/// Classify a diagnostic-only diff.
pub fn classify(diff: &BatchDiff) -> DiagnosticDelta {
    let mut delta = DiagnosticDelta::default();

    delta.regressions.extend(diff.added.iter().cloned());
    delta.improvements.extend(diff.removed.iter().cloned());

    for (old, new) in &diff.changed {
        let old_severity = old.payload.severity.unwrap_or(Severity::Info);
        let new_severity = new.payload.severity.unwrap_or(Severity::Info);
        if new_severity > old_severity {
            delta.regressions.push(new.clone());
        } else if new_severity < old_severity {
            delta.improvements.push(old.clone());
        } else {
            delta.unchanged_severity.push(new.clone());
        }
    }
    delta
}

/// Compare diagnostics between two batches and classify the result.
pub fn diff_diagnostics(
    root: &StoreRoot,
    batch_a: &str,
    batch_b: &str,
) -> DiffResult<DiagnosticDelta> {
    let diff = diff_batches(root, batch_a, batch_b, Some(OutputKind::Diagnostic))?;
    Ok(classify(&diff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diff_records;
    use cb_output::{OutputDraft, RecordHeader};

    fn header() -> RecordHeader {
        RecordHeader {
            schema_version: 1,
            snapshot_id: "s".into(),
            batch_id: "b".into(),
            task_id: "04_lint".into(),
            shard_id: "00".parse().unwrap(),
            ts: String::new(),
        }
    }

    fn diag(path: &str, line: u32, code: &str, severity: Severity) -> OutputRecord {
        OutputRecord::from_draft(
            OutputDraft::diagnostic(path, severity, code, "msg", line, 1),
            header(),
        )
    }

    #[test]
    fn new_diagnostic_is_a_regression() {
        let a = Vec::new();
        let b = vec![diag("x.py", 1, "L101", Severity::Warning)];
        let delta = classify(&diff_records(&a, &b));
        assert_eq!(delta.regressions.len(), 1);
        assert!(delta.improvements.is_empty());
        assert!(!delta.is_clean());
    }

    #[test]
    fn removed_diagnostic_is_an_improvement() {
        let a = vec![diag("x.py", 1, "L101", Severity::Warning)];
        let b = Vec::new();
        let delta = classify(&diff_records(&a, &b));
        assert!(delta.regressions.is_empty());
        assert_eq!(delta.improvements.len(), 1);
        assert!(delta.is_clean());
    }

    #[test]
    fn severity_escalation_is_a_regression() {
        let a = vec![diag("x.py", 1, "L101", Severity::Info)];
        let b = vec![diag("x.py", 1, "L101", Severity::Error)];
        let delta = classify(&diff_records(&a, &b));
        assert_eq!(delta.regressions.len(), 1);
        assert_eq!(delta.regressions[0].payload.severity, Some(Severity::Error));
    }

    #[test]
    fn severity_reduction_is_an_improvement() {
        let a = vec![diag("x.py", 1, "L101", Severity::Error)];
        let b = vec![diag("x.py", 1, "L101", Severity::Info)];
        let delta = classify(&diff_records(&a, &b));
        assert_eq!(delta.improvements.len(), 1);
        // The previously-worse record is what improved.
        assert_eq!(delta.improvements[0].payload.severity, Some(Severity::Error));
    }

    #[test]
    fn message_change_alone_is_severity_neutral() {
        let a = vec![diag("x.py", 1, "L101", Severity::Warning)];
        let mut b = vec![diag("x.py", 1, "L101", Severity::Warning)];
        b[0].payload.message = Some("reworded".into());
        let delta = classify(&diff_records(&a, &b));
        assert!(delta.regressions.is_empty());
        assert!(delta.improvements.is_empty());
        assert_eq!(delta.unchanged_severity.len(), 1);
    }
}
