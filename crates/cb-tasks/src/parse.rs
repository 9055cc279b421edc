use cb_output::OutputDraft;
use cb_plan::{Executor, ExecutorContext, PlanError, PlanResult};
use cb_snapshot::FileEntry;
use cb_types::{OutputKind, Severity};
use serde_json::Value;

use crate::summary::{self, SourceSummary};

/// `parse`: per-file source summary stored in CAS as `kind=ast`, plus
/// parse diagnostics.
///
/// Python files get the structural scan; everything else that decodes as
/// UTF-8 gets text shape statistics. Binary files are skipped. A file
/// whose delimiters cannot be balanced yields an `E0001` error diagnostic
/// and no summary.
pub struct ParseExecutor;

impl Executor for ParseExecutor {
    fn task_type(&self) -> &str {
        "parse"
    }

    fn execute(
        &self,
        config: &Value,
        files: &[FileEntry],
        ctx: &dyn ExecutorContext,
    ) -> PlanResult<Vec<OutputDraft>> {
        let emit_ast = config.get("emit_ast").and_then(Value::as_bool).unwrap_or(true);
        let emit_diagnostics = config
            .get("emit_diagnostics")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut drafts = Vec::new();
        for file in files {
            let bytes = ctx.get_object(&file.object)?;
            let Ok(source) = String::from_utf8(bytes) else {
                continue;
            };

            let is_python = file.lang_hint.as_deref() == Some("python");
            if is_python {
                if let Err(reason) = summary::check_balanced(&source) {
                    if emit_diagnostics {
                        drafts.push(OutputDraft::diagnostic(
                            &file.path,
                            Severity::Error,
                            "E0001",
                            reason,
                            1,
                            1,
                        ));
                    }
                    continue;
                }
            }

            if !emit_ast {
                continue;
            }
            let summary = if is_python {
                SourceSummary::Python(summary::scan_python(&source))
            } else {
                SourceSummary::Text(summary::scan_text(&source))
            };
            let payload = serde_json::to_vec(&summary)
                .map_err(|e| PlanError::Serialization(e.to_string()))?;
            let (object, format) = ctx.put_object(&OutputKind::Ast, "json", &payload)?;
            drafts.push(OutputDraft::ast(&file.path, object, format));
        }
        Ok(drafts)
    }
}

/// Decode a prior `ast` record back into a summary.
pub fn load_summary(ctx: &dyn ExecutorContext, object: &cb_types::ObjectId) -> PlanResult<SourceSummary> {
    let bytes = ctx.get_object(object)?;
    serde_json::from_slice(&bytes).map_err(|e| PlanError::Serialization(e.to_string()))
}
