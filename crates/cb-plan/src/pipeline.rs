//! Built-in pipeline templates.
//!
//! A pipeline is a named bundle that expands into a plan: `parse` runs the
//! parser alone, `analyze` adds the metrics pass, and `full` fans out into
//! analyze, symbols, and lint, all downstream of parse.

use serde_json::json;

use crate::error::{PlanError, PlanResult};
use crate::model::TaskSpec;

/// A named pipeline template.
#[derive(Clone, Debug)]
pub struct PipelineDef {
    pub name: &'static str,
    pub description: &'static str,
    pub tasks: Vec<TaskSpec>,
}

/// All registered pipelines, in menu order.
pub fn pipelines() -> Vec<PipelineDef> {
    vec![
        PipelineDef {
            name: "parse",
            description: "Parse source files and emit ast + diagnostics",
            tasks: vec![parse_task()],
        },
        PipelineDef {
            name: "analyze",
            description: "Parse, then compute per-file metrics",
            tasks: vec![parse_task(), analyze_task()],
        },
        PipelineDef {
            name: "full",
            description: "Parse, then analyze + symbols + lint",
            tasks: vec![parse_task(), analyze_task(), symbols_task(), lint_task()],
        },
    ]
}

/// Look up a pipeline by name.
pub fn lookup(name: &str) -> PlanResult<PipelineDef> {
    pipelines()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| PlanError::UnknownPipeline(name.to_string()))
}

fn parse_task() -> TaskSpec {
    TaskSpec::new("01_parse", "parse").with_config(json!({
        "emit_ast": true,
        "emit_diagnostics": true,
    }))
}

fn analyze_task() -> TaskSpec {
    TaskSpec::new("02_analyze", "analyze").with_deps(&["01_parse"])
}

fn symbols_task() -> TaskSpec {
    TaskSpec::new("03_symbols", "symbols").with_deps(&["01_parse"])
}

fn lint_task() -> TaskSpec {
    TaskSpec::new("04_lint", "lint").with_deps(&["01_parse"]).with_config(json!({
        "max_line_length": 120,
    }))
}
