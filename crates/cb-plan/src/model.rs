use std::collections::HashSet;

use cb_types::schema::{SCHEMA_PLAN, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlanError, PlanResult};
use crate::registry::ExecutorRegistry;

/// One stage of a pipeline as persisted in `plan.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    /// Executor selector; must be registered at run time.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Earlier task ids this task consumes outputs from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
    /// Resolved executor configuration, immutable once the batch exists.
    #[serde(default)]
    pub config: Value,
}

impl TaskSpec {
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            deps: Vec::new(),
            config: Value::Object(Default::default()),
        }
    }

    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

/// The persisted `plan.json` for a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub schema_name: String,
    pub schema_version: u32,
    pub batch_id: String,
    pub tasks: Vec<TaskSpec>,
}

impl Plan {
    pub fn new(batch_id: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            schema_name: SCHEMA_PLAN.to_string(),
            schema_version: SCHEMA_VERSION,
            batch_id: batch_id.into(),
            tasks,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.task_id.clone()).collect()
    }

    /// Validate the plan against a registry:
    /// ids unique, deps acyclic by construction (backward references only),
    /// every `type` registered.
    pub fn validate(&self, registry: &ExecutorRegistry) -> PlanResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.task_id.as_str()) {
                return Err(PlanError::DuplicateTaskId(task.task_id.clone()));
            }
            for dep in &task.deps {
                if self.task(dep).is_none() {
                    return Err(PlanError::UnknownDep {
                        task: task.task_id.clone(),
                        dep: dep.clone(),
                    });
                }
                if !seen.contains(dep.as_str()) {
                    return Err(PlanError::ForwardDep {
                        task: task.task_id.clone(),
                        dep: dep.clone(),
                    });
                }
            }
            if !registry.contains(&task.task_type) {
                return Err(PlanError::UnknownType {
                    task: task.task_id.clone(),
                    task_type: task.task_type.clone(),
                });
            }
        }
        Ok(())
    }
}
