use cb_output::OutputDraft;
use cb_plan::{Executor, ExecutorContext, PlanResult};
use cb_snapshot::FileEntry;
use cb_types::OutputKind;
use serde_json::Value;

use crate::parse::load_summary;
use crate::summary::SourceSummary;

/// `symbols`: definitions and import edges from prior parse summaries.
///
/// Functions, classes, and module-level assignments become `symbol`
/// records; each import becomes an `edge` record targeting the imported
/// module.
pub struct SymbolsExecutor;

impl Executor for SymbolsExecutor {
    fn task_type(&self) -> &str {
        "symbols"
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
            let path = &record.path;

            for func in &summary.functions {
                let mut draft = OutputDraft::symbol(path, &func.name, "function", func.line);
                draft.payload.scope = Some(func.scope.clone());
                drafts.push(draft);
            }
            for class in &summary.classes {
                let mut draft = OutputDraft::symbol(path, &class.name, "class", class.line);
                draft.payload.scope = Some(class.scope.clone());
                drafts.push(draft);
            }
            for assign in summary.assignments.iter().filter(|a| !a.in_function) {
                let mut draft = OutputDraft::symbol(path, &assign.name, "variable", assign.line);
                draft.payload.scope = Some(assign.scope.clone());
                drafts.push(draft);
            }
            for import in &summary.imports {
                drafts.push(OutputDraft::edge(path, "import", &import.module));
            }
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{run_executor, TestContext};

    const SOURCE: &str = "import sys\nTOP = 1\nclass C:\n  def m(self):\n    local = 2\n";

    fn drafts() -> Vec<OutputDraft> {
        let ctx = TestContext::new();
        let files = ctx.files(&[("mod.py", SOURCE)]);
        ctx.seed_parse_outputs(&files);
        run_executor(&SymbolsExecutor, &serde_json::json!({}), &files, &ctx)
    }

    #[test]
    fn functions_classes_and_module_vars_become_symbols() {
        let drafts = drafts();
        let symbols: Vec<(&str, &str)> = drafts
            .iter()
            .filter(|d| d.kind == OutputKind::Symbol)
            .map(|d| {
                (
                    d.payload.name.as_deref().unwrap(),
                    d.payload.symbol_type.as_deref().unwrap(),
                )
            })
            .collect();
        assert!(symbols.contains(&("m", "function")));
        assert!(symbols.contains(&("C", "class")));
        assert!(symbols.contains(&("TOP", "variable")));
        // Function-local assignments are not symbols.
        assert!(!symbols.iter().any(|(name, _)| *name == "local"));
    }

    #[test]
    fn method_scope_is_its_class() {
        let drafts = drafts();
        let method = drafts
            .iter()
            .find(|d| d.payload.name.as_deref() == Some("m"))
            .unwrap();
        assert_eq!(method.payload.scope.as_deref(), Some("C"));
    }

    #[test]
    fn imports_become_edges() {
        let drafts = drafts();
        let edges: Vec<&OutputDraft> =
            drafts.iter().filter(|d| d.kind == OutputKind::Edge).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].payload.edge_type.as_deref(), Some("import"));
        assert_eq!(edges[0].payload.target.as_deref(), Some("sys"));
    }

    #[test]
    fn all_drafts_validate() {
        for draft in drafts() {
            draft.validate().unwrap();
        }
    }
}
