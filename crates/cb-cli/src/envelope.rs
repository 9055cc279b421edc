//! Structured error surfacing.
//!
//! Every failure leaves the process through here: a machine-readable
//! `{error:{code, message, hints, details}}` envelope on stderr when
//! `--format json` was requested, a single human-readable line otherwise.
//! Exit codes: 0 success, 1 expected failure, 2 invalid arguments or
//! missing store, 3 internal error.

use cb_runner::RunnerError;
use cb_snapshot::SnapshotError;
use cb_store::StoreError;
use colored::Colorize;
use serde_json::json;

/// Failures raised by the CLI layer itself.
#[derive(Debug, thiserror::Error)]
pub enum CliFailure {
    #[error("no store given; pass --store or set CODEBATCH_STORE")]
    MissingStore,

    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("query returned no records")]
    StrictEmpty,

    #[error("batch did not complete: {failed} shard(s) failed")]
    RunIncomplete { failed: usize },
}

pub struct Envelope {
    pub code: &'static str,
    pub exit_code: i32,
    pub message: String,
    pub hints: Vec<String>,
    pub details: serde_json::Value,
}

impl Envelope {
    fn new(code: &'static str, exit_code: i32, message: String) -> Self {
        Self {
            code,
            exit_code,
            message,
            hints: Vec::new(),
            details: json!({}),
        }
    }

    pub fn print(&self, json_mode: bool) {
        if json_mode {
            let envelope = json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                    "hints": self.hints,
                    "details": self.details,
                }
            });
            eprintln!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
        } else {
            eprintln!("{} {}", "error:".red().bold(), self.message);
            for hint in &self.hints {
                eprintln!("  {} {hint}", "hint:".dimmed());
            }
        }
    }
}

/// Classify an error chain into its envelope. The outermost recognizable
/// error wins; wrapper variants defer to their sources.
pub fn envelope_for(err: &anyhow::Error) -> Envelope {
    for cause in err.chain() {
        if let Some(envelope) = classify(cause) {
            return envelope;
        }
    }
    Envelope::new("INTERNAL_ERROR", 3, format!("internal error: {err:#}"))
}

fn classify(cause: &(dyn std::error::Error + 'static)) -> Option<Envelope> {
    if let Some(failure) = cause.downcast_ref::<CliFailure>() {
        let envelope = match failure {
            CliFailure::MissingStore => {
                let mut e = Envelope::new("STORE_NOT_FOUND", 2, failure.to_string());
                e.hints.push("run: codebatch init <store>".to_string());
                e
            }
            CliFailure::InvalidArgument { .. } => {
                Envelope::new("INVALID_ARGUMENT", 2, failure.to_string())
            }
            CliFailure::StrictEmpty => Envelope::new("QUERY_EMPTY", 1, failure.to_string()),
            CliFailure::RunIncomplete { failed } => {
                let mut e = Envelope::new("RUN_INCOMPLETE", 1, failure.to_string());
                e.details = json!({"shards_failed": failed});
                e.hints.push("re-run or reset failed shards, then resume".to_string());
                e
            }
        };
        return Some(envelope);
    }

    if let Some(store) = cause.downcast_ref::<StoreError>() {
        let envelope = match store {
            StoreError::NotFound(path) => {
                let mut e = Envelope::new("STORE_NOT_FOUND", 2, store.to_string());
                e.hints.push(format!("run: codebatch init {}", path.display()));
                e
            }
            StoreError::Invalid { .. } => Envelope::new("STORE_INVALID", 2, store.to_string()),
            StoreError::AlreadyExists(_) => Envelope::new("STORE_EXISTS", 1, store.to_string()),
            StoreError::ObjectNotFound(_) => {
                Envelope::new("OBJECT_NOT_FOUND", 1, store.to_string())
            }
            StoreError::Corrupt { id, actual } => {
                let mut e = Envelope::new("CAS_CORRUPT", 1, store.to_string());
                e.details = json!({"object": id.to_ref(), "actual": actual.to_ref()});
                e
            }
            StoreError::Serialization(_) => Envelope::new("SCHEMA_ERROR", 1, store.to_string()),
            StoreError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(snapshot) = cause.downcast_ref::<SnapshotError>() {
        let envelope = match snapshot {
            SnapshotError::NotFound(id) => {
                let mut e = Envelope::new("SNAPSHOT_NOT_FOUND", 1, snapshot.to_string());
                e.details = json!({"snapshot_id": id});
                e
            }
            SnapshotError::PathCollision { key, paths } => {
                let mut e = Envelope::new("PATH_COLLISION", 1, snapshot.to_string());
                e.details = json!({"path_key": key, "paths": [paths.0, paths.1]});
                e
            }
            SnapshotError::NotADirectory(_) | SnapshotError::InvalidPattern { .. } => {
                Envelope::new("INVALID_ARGUMENT", 2, snapshot.to_string())
            }
            SnapshotError::WalkLoop(_) => Envelope::new("WALK_LOOP", 1, snapshot.to_string()),
            SnapshotError::Serialization(_) => {
                Envelope::new("SCHEMA_ERROR", 1, snapshot.to_string())
            }
            SnapshotError::Path(_) => Envelope::new("INVALID_ARGUMENT", 2, snapshot.to_string()),
            SnapshotError::Store(inner) => return classify(inner),
            SnapshotError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(runner) = cause.downcast_ref::<RunnerError>() {
        let envelope = match runner {
            RunnerError::BatchNotFound(id) => {
                let mut e = Envelope::new("BATCH_NOT_FOUND", 1, runner.to_string());
                e.details = json!({"batch_id": id});
                e.hints.push("check the batch id against batches/ in the store".to_string());
                e
            }
            RunnerError::BatchExists(_) => Envelope::new("BATCH_EXISTS", 1, runner.to_string()),
            RunnerError::TaskNotFound { .. } => {
                Envelope::new("TASK_NOT_FOUND", 1, runner.to_string())
            }
            RunnerError::DepsUnsatisfied { .. } => {
                Envelope::new("DEPS_UNSATISFIED", 1, runner.to_string())
            }
            RunnerError::InvalidTransition { .. } => {
                Envelope::new("INVALID_TRANSITION", 1, runner.to_string())
            }
            RunnerError::StoreLocked => Envelope::new("STORE_LOCKED", 1, runner.to_string()),
            RunnerError::Cancelled => Envelope::new("CANCELLED", 1, runner.to_string()),
            RunnerError::Serialization(_) => Envelope::new("SCHEMA_ERROR", 1, runner.to_string()),
            RunnerError::Snapshot(inner) => return classify(inner),
            RunnerError::Plan(inner) => return classify(inner),
            RunnerError::Output(inner) => return classify(inner),
            RunnerError::Store(inner) => return classify(inner),
            RunnerError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(plan) = cause.downcast_ref::<cb_plan::PlanError>() {
        let envelope = match plan {
            cb_plan::PlanError::UnknownPipeline(name) => {
                let mut e = Envelope::new("PIPELINE_NOT_FOUND", 1, plan.to_string());
                e.hints.push("available pipelines: parse, analyze, full".to_string());
                e.details = json!({"pipeline": name});
                e
            }
            cb_plan::PlanError::ExecutorFailed { .. } => {
                Envelope::new("EXECUTOR_FAILED", 1, plan.to_string())
            }
            cb_plan::PlanError::Serialization(_) => {
                Envelope::new("SCHEMA_ERROR", 1, plan.to_string())
            }
            cb_plan::PlanError::DuplicateTaskId(_)
            | cb_plan::PlanError::UnknownDep { .. }
            | cb_plan::PlanError::ForwardDep { .. }
            | cb_plan::PlanError::UnknownType { .. } => {
                Envelope::new("PLAN_INVALID", 1, plan.to_string())
            }
            cb_plan::PlanError::Store(inner) => return classify(inner),
            cb_plan::PlanError::Output(inner) => return classify(inner),
        };
        return Some(envelope);
    }

    if let Some(output) = cause.downcast_ref::<cb_output::OutputError>() {
        let envelope = match output {
            cb_output::OutputError::MissingField { .. }
            | cb_output::OutputError::Serialization(_) => {
                Envelope::new("SCHEMA_ERROR", 1, output.to_string())
            }
            cb_output::OutputError::Store(inner) => return classify(inner),
            cb_output::OutputError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(query) = cause.downcast_ref::<cb_query::QueryError>() {
        let envelope = match query {
            cb_query::QueryError::UnknownStatsGroup(_) => {
                Envelope::new("INVALID_ARGUMENT", 2, query.to_string())
            }
            cb_query::QueryError::Runner(inner) => return classify(inner),
            cb_query::QueryError::Snapshot(inner) => return classify(inner),
            cb_query::QueryError::Output(inner) => return classify(inner),
            cb_query::QueryError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(cache) = cause.downcast_ref::<cb_cache::CacheError>() {
        let envelope = match cache {
            cb_cache::CacheError::Lmdb(_)
            | cb_cache::CacheError::MissingDatabase(_)
            | cb_cache::CacheError::MissingMeta
            | cb_cache::CacheError::Serialization(_) => {
                Envelope::new("CACHE_ERROR", 1, cache.to_string())
            }
            cb_cache::CacheError::Runner(inner) => return classify(inner),
            cb_cache::CacheError::Snapshot(inner) => return classify(inner),
            cb_cache::CacheError::Output(inner) => return classify(inner),
            cb_cache::CacheError::Query(inner) => return classify(inner),
            cb_cache::CacheError::Io(_) => return None,
        };
        return Some(envelope);
    }

    if let Some(diff) = cause.downcast_ref::<cb_diff::DiffError>() {
        let envelope = match diff {
            cb_diff::DiffError::Serialization(_) => {
                Envelope::new("SCHEMA_ERROR", 1, diff.to_string())
            }
            cb_diff::DiffError::Cache(inner) => return classify(inner),
            cb_diff::DiffError::Query(inner) => return classify(inner),
        };
        return Some(envelope);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_store_exits_2() {
        let err = anyhow::Error::new(CliFailure::MissingStore);
        let envelope = envelope_for(&err);
        assert_eq!(envelope.code, "STORE_NOT_FOUND");
        assert_eq!(envelope.exit_code, 2);
    }

    #[test]
    fn nested_snapshot_error_is_classified_through_the_chain() {
        let err = anyhow::Error::new(RunnerError::Snapshot(SnapshotError::NotFound(
            "abc".to_string(),
        )));
        let envelope = envelope_for(&err);
        assert_eq!(envelope.code, "SNAPSHOT_NOT_FOUND");
        assert_eq!(envelope.exit_code, 1);
    }

    #[test]
    fn path_collision_carries_both_paths() {
        let err = anyhow::Error::new(SnapshotError::PathCollision {
            key: "readme.md".into(),
            paths: ("Readme.md".into(), "readme.md".into()),
        });
        let envelope = envelope_for(&err);
        assert_eq!(envelope.code, "PATH_COLLISION");
        assert_eq!(envelope.details["paths"][0], "Readme.md");
    }

    #[test]
    fn unknown_errors_are_internal() {
        let err = anyhow::anyhow!("something unforeseen");
        let envelope = envelope_for(&err);
        assert_eq!(envelope.code, "INTERNAL_ERROR");
        assert_eq!(envelope.exit_code, 3);
    }

    #[test]
    fn store_not_found_hints_at_init() {
        let err = anyhow::Error::new(StoreError::NotFound(PathBuf::from("./missing")));
        let envelope = envelope_for(&err);
        assert_eq!(envelope.exit_code, 2);
        assert!(envelope.hints[0].contains("codebatch init"));
    }

    #[test]
    fn strict_empty_is_an_expected_failure() {
        let err = anyhow::Error::new(CliFailure::StrictEmpty);
        let envelope = envelope_for(&err);
        assert_eq!(envelope.code, "QUERY_EMPTY");
        assert_eq!(envelope.exit_code, 1);
    }
}
