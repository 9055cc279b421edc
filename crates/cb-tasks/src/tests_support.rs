//! In-memory executor context for exercising executors without a store.

use std::cell::RefCell;
use std::collections::HashMap;

use cb_output::{OutputDraft, OutputRecord, RecordHeader};
use cb_plan::{Executor, ExecutorContext, PlanError, PlanResult};
use cb_snapshot::FileEntry;
use cb_types::{ObjectId, OutputKind};
use serde_json::Value;

pub struct TestContext {
    objects: RefCell<HashMap<ObjectId, Vec<u8>>>,
    prior: RefCell<HashMap<String, Vec<OutputRecord>>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(HashMap::new()),
            prior: RefCell::new(HashMap::new()),
        }
    }

    pub fn files(&self, specs: &[(&str, &str)]) -> Vec<FileEntry> {
        let byte_specs: Vec<(&str, Vec<u8>)> = specs
            .iter()
            .map(|(path, contents)| (*path, contents.as_bytes().to_vec()))
            .collect();
        let refs: Vec<(&str, &[u8])> = byte_specs
            .iter()
            .map(|(path, bytes)| (*path, bytes.as_slice()))
            .collect();
        self.files_bytes(&refs)
    }

    pub fn files_bytes(&self, specs: &[(&str, &[u8])]) -> Vec<FileEntry> {
        specs
            .iter()
            .map(|(path, bytes)| {
                let object = ObjectId::from_bytes(bytes);
                self.objects.borrow_mut().insert(object, bytes.to_vec());
                let (path, path_key) = cb_types::path::canonicalize(path).unwrap();
                FileEntry {
                    schema_version: 1,
                    lang_hint: cb_snapshot::entry::detect_lang_hint(&path).map(str::to_string),
                    mode: None,
                    path,
                    path_key,
                    object,
                    size: bytes.len() as u64,
                }
            })
            .collect()
    }

    /// Run the parse executor over `files` and stash its outputs as the
    /// prior records of `01_parse`, the way the shard runner would.
    pub fn seed_parse_outputs(&self, files: &[FileEntry]) {
        let drafts = crate::parse::ParseExecutor
            .execute(&serde_json::json!({}), files, self)
            .unwrap();
        let records = drafts
            .into_iter()
            .map(|draft| {
                OutputRecord::from_draft(
                    draft,
                    RecordHeader {
                        schema_version: 1,
                        snapshot_id: "snap".into(),
                        batch_id: "batch".into(),
                        task_id: "01_parse".into(),
                        shard_id: "00".parse().unwrap(),
                        ts: "2026-02-02T12:00:00Z".into(),
                    },
                )
            })
            .collect();
        self.prior.borrow_mut().insert("01_parse".into(), records);
    }
}

impl ExecutorContext for TestContext {
    fn iter_prior_outputs(
        &self,
        task_id: &str,
        kind: Option<&OutputKind>,
    ) -> PlanResult<Vec<OutputRecord>> {
        let prior = self.prior.borrow();
        let records = prior.get(task_id).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| kind.map(|k| r.kind == *k).unwrap_or(true))
            .collect())
    }

    fn put_object(
        &self,
        _kind: &OutputKind,
        format: &str,
        bytes: &[u8],
    ) -> PlanResult<(ObjectId, String)> {
        let object = ObjectId::from_bytes(bytes);
        self.objects.borrow_mut().insert(object, bytes.to_vec());
        Ok((object, format.to_string()))
    }

    fn get_object(&self, id: &ObjectId) -> PlanResult<Vec<u8>> {
        self.objects
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| PlanError::Serialization(format!("missing test object {id}")))
    }
}

pub fn run_executor(
    executor: &dyn Executor,
    config: &Value,
    files: &[FileEntry],
    ctx: &TestContext,
) -> Vec<OutputDraft> {
    executor.execute(config, files, ctx).unwrap()
}
