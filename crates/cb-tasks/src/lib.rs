//! Built-in analysis executors.
//!
//! These satisfy the executor interface exactly as an external analysis
//! would: deterministic over `(config, files, prior outputs)`, no clock
//! reads, all storage through the provided context.
//!
//! - `parse` — per-file source summary stored in CAS (`kind=ast`), plus
//!   parse diagnostics
//! - `analyze` — per-file metrics (`complexity`, `function_count`,
//!   `import_count`) from prior summaries
//! - `symbols` — symbol definitions and import edges from prior summaries
//! - `lint` — text rules L001–L005 and summary-aware rules L101–L103

pub mod analyze;
pub mod lint;
pub mod parse;
pub mod summary;
pub mod symbols;

#[cfg(test)]
mod tests_support;

pub use analyze::AnalyzeExecutor;
pub use lint::LintExecutor;
pub use parse::ParseExecutor;
pub use symbols::SymbolsExecutor;

use cb_plan::ExecutorRegistry;

/// Register every built-in executor.
pub fn register_builtin(registry: &mut ExecutorRegistry) {
    registry.register(Box::new(ParseExecutor));
    registry.register(Box::new(AnalyzeExecutor));
    registry.register(Box::new(SymbolsExecutor));
    registry.register(Box::new(LintExecutor));
}

/// A registry holding exactly the built-in executors.
pub fn builtin_registry() -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    register_builtin(&mut registry);
    registry
}
