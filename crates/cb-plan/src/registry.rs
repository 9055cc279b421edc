use std::collections::BTreeMap;

use crate::executor::Executor;

/// Maps task `type` to executor.
///
/// The registry is assembled once at process start; plan validation checks
/// every task's `type` against it before anything runs.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<String, Box<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) {
        self.executors
            .insert(executor.task_type().to_string(), executor);
    }

    pub fn get(&self, task_type: &str) -> Option<&dyn Executor> {
        self.executors.get(task_type).map(Box::as_ref)
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.executors.contains_key(task_type)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("types", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests_support::NullExecutor;

    #[test]
    fn register_and_lookup() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Box::new(NullExecutor::new("parse")));

        assert!(registry.contains("parse"));
        assert!(!registry.contains("lint"));
        assert_eq!(registry.get("parse").unwrap().task_type(), "parse");
        assert!(registry.get("lint").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Box::new(NullExecutor::new("lint")));
        registry.register(Box::new(NullExecutor::new("analyze")));
        assert_eq!(registry.names(), vec!["analyze", "lint"]);
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Box::new(NullExecutor::new("parse")));
        registry.register(Box::new(NullExecutor::new("parse")));
        assert_eq!(registry.names().len(), 1);
    }
}
