use cb_output::{OutputDraft, OutputRecord};
use cb_snapshot::FileEntry;
use cb_types::{ObjectId, OutputKind};
use serde_json::Value;

use crate::error::PlanResult;

/// Capabilities the runner exposes to an executor.
///
/// Prior-output access is scoped to the current shard: a downstream task
/// reads only the records its dependency committed for this shard id. CAS
/// writes are safe mid-run because the object store is add-only.
pub trait ExecutorContext {
    /// Records a dependency task committed for this shard, optionally
    /// filtered by kind, in stored order.
    fn iter_prior_outputs(
        &self,
        task_id: &str,
        kind: Option<&OutputKind>,
    ) -> PlanResult<Vec<OutputRecord>>;

    /// Store bytes in the CAS, chunking transparently when they exceed the
    /// configured threshold. Returns the object to reference and the
    /// record's `format` value.
    fn put_object(&self, kind: &OutputKind, format: &str, bytes: &[u8]) -> PlanResult<(ObjectId, String)>;

    /// Read an object's bytes, reassembling chunked payloads.
    fn get_object(&self, id: &ObjectId) -> PlanResult<Vec<u8>>;
}

/// One pluggable analysis stage.
///
/// Executors MUST be deterministic over `(config, files, prior_outputs)`:
/// no wall-clock reads into payloads (the runner stamps `ts`), no ordering
/// assumptions beyond canonical file order, no reads outside the provided
/// inputs. The runner stamps headers and commits the returned drafts
/// atomically.
pub trait Executor: Send + Sync {
    /// The task `type` this executor is registered under.
    fn task_type(&self) -> &str;

    /// Process this shard's files and return the records to commit.
    fn execute(
        &self,
        config: &Value,
        files: &[FileEntry],
        ctx: &dyn ExecutorContext,
    ) -> PlanResult<Vec<OutputDraft>>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod tests_support {
    use super::*;

    /// Executor that emits nothing; used by plan and runner tests.
    pub struct NullExecutor {
        task_type: String,
    }

    impl NullExecutor {
        pub fn new(task_type: impl Into<String>) -> Self {
            Self {
                task_type: task_type.into(),
            }
        }
    }

    impl Executor for NullExecutor {
        fn task_type(&self) -> &str {
            &self.task_type
        }

        fn execute(
            &self,
            _config: &Value,
            _files: &[FileEntry],
            _ctx: &dyn ExecutorContext,
        ) -> PlanResult<Vec<OutputDraft>> {
            Ok(Vec::new())
        }
    }
}
