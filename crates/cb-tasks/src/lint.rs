use cb_output::OutputDraft;
use cb_plan::{Executor, ExecutorContext, PlanResult};
use cb_snapshot::FileEntry;
use cb_types::{OutputKind, Severity};
use serde_json::Value;

use crate::parse::load_summary;
use crate::summary::{PythonSummary, SourceSummary};

const DEFAULT_MAX_LINE_LENGTH: usize = 120;
const TODO_MARKERS: [&str; 4] = ["TODO", "FIXME", "XXX", "HACK"];

/// `lint`: text rules over raw content plus summary-aware rules over
/// prior parse output.
///
/// Text rules:
/// - `L001` trailing whitespace
/// - `L002` line too long (`max_line_length`, default 120)
/// - `L003` TODO/FIXME/XXX/HACK marker
/// - `L004` tab indentation
/// - `L005` missing newline at end of file
///
/// Summary rules (Python only):
/// - `L101` unused import
/// - `L102` unused variable (function scope)
/// - `L103` shadowing of a module-level name
pub struct LintExecutor;

impl Executor for LintExecutor {
    fn task_type(&self) -> &str {
        "lint"
    }

    fn execute(
        &self,
        config: &Value,
        files: &[FileEntry],
        ctx: &dyn ExecutorContext,
    ) -> PlanResult<Vec<OutputDraft>> {
        let max_line_length = config
            .get("max_line_length")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_LINE_LENGTH);

        let mut drafts = Vec::new();

        for file in files {
            let bytes = ctx.get_object(&file.object)?;
            let Ok(source) = String::from_utf8(bytes) else {
                continue;
            };
            lint_text(&file.path, &source, max_line_length, &mut drafts);
        }

        for record in ctx.iter_prior_outputs("01_parse", Some(&OutputKind::Ast))? {
            let Some(object) = record.payload.object else {
                continue;
            };
            let SourceSummary::Python(summary) = load_summary(ctx, &object)? else {
                continue;
            };
            lint_summary(&record.path, &summary, &mut drafts);
        }

        Ok(drafts)
    }
}

fn lint_text(path: &str, source: &str, max_line_length: usize, drafts: &mut Vec<OutputDraft>) {
    let lines: Vec<&str> = source.split('\n').collect();
    for (index, line) in lines.iter().enumerate() {
        let line_no = (index + 1) as u32;
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line != line.trim_end() {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Warning,
                "L001",
                "Trailing whitespace",
                line_no,
                line.trim_end().chars().count() as u32 + 1,
            ));
        }
        let width = line.chars().count();
        if width > max_line_length {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Warning,
                "L002",
                format!("Line too long ({width} > {max_line_length})"),
                line_no,
                max_line_length as u32 + 1,
            ));
        }
        let upper = line.to_uppercase();
        if let Some(marker) = TODO_MARKERS.iter().find(|m| upper.contains(*m)) {
            let column = upper.find(marker).unwrap_or(0) as u32 + 1;
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Info,
                "L003",
                format!("Found {marker} comment"),
                line_no,
                column,
            ));
        }
        if line.starts_with('\t') {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Warning,
                "L004",
                "Tab indentation",
                line_no,
                1,
            ));
        }
    }

    if !source.is_empty() && !source.ends_with('\n') {
        let last = lines.last().copied().unwrap_or("");
        drafts.push(OutputDraft::diagnostic(
            path,
            Severity::Warning,
            "L005",
            "Missing newline at end of file",
            lines.len() as u32,
            last.chars().count() as u32 + 1,
        ));
    }
}

fn lint_summary(path: &str, summary: &PythonSummary, drafts: &mut Vec<OutputDraft>) {
    let referenced = |name: &str| summary.references.iter().any(|r| r == name);

    for import in &summary.imports {
        if !referenced(&import.name) {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Warning,
                "L101",
                format!("Unused import '{}'", import.name),
                import.line,
                1,
            ));
        }
    }

    for assign in summary.assignments.iter().filter(|a| a.in_function) {
        if !referenced(&assign.name) {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Warning,
                "L102",
                format!("Unused variable '{}'", assign.name),
                assign.line,
                1,
            ));
        }
    }

    // Module-level names that function bodies redefine.
    let module_names: Vec<&str> = summary
        .imports
        .iter()
        .map(|i| i.name.as_str())
        .chain(
            summary
                .assignments
                .iter()
                .filter(|a| !a.in_function)
                .map(|a| a.name.as_str()),
        )
        .chain(summary.functions.iter().filter(|f| f.scope == "module").map(|f| f.name.as_str()))
        .collect();

    for assign in summary.assignments.iter().filter(|a| a.in_function) {
        if module_names.contains(&assign.name.as_str()) {
            drafts.push(OutputDraft::diagnostic(
                path,
                Severity::Info,
                "L103",
                format!("'{}' shadows a module-level name", assign.name),
                assign.line,
                1,
            ));
        }
    }
}
