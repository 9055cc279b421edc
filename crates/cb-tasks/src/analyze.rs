use cb_output::OutputDraft;
use cb_plan::{Executor, ExecutorContext, PlanResult};
use cb_snapshot::FileEntry;
use cb_types::OutputKind;
use serde_json::Value;

use crate::parse::load_summary;
use crate::summary::SourceSummary;

/// `analyze`: per-file metrics from prior parse summaries.
///
/// Python files produce `complexity` (1 + decision points),
/// `function_count`, and `import_count`.
pub struct AnalyzeExecutor;

impl Executor for AnalyzeExecutor {
    fn task_type(&self) -> &str {
        "analyze"
    }

    fn execute(
        &self,
        _config: &Value,
        _files: &[FileEntry],
        ctx: &dyn ExecutorContext,
    ) -> PlanResult<Vec<OutputDraft>> {
        let mut drafts = Vec::new();
        for record in ctx.iter_prior_outputs("01_parse", Some(&OutputKind::Ast))? {
            let Some(object) = record.payload.object else {
                continue;
            };
            let SourceSummary::Python(summary) = load_summary(ctx, &object)? else {
                continue;
            };
            drafts.push(OutputDraft::metric(
                &record.path,
                "complexity",
                1 + summary.branch_points as u64,
            ));
            drafts.push(OutputDraft::metric(
                &record.path,
                "function_count",
                summary.functions.len() as u64,
            ));
            drafts.push(OutputDraft::metric(
                &record.path,
                "import_count",
                summary.imports.len() as u64,
            ));
        }
        Ok(drafts)
    }
}
