//! Query routing: cache when fresh, scan otherwise, never both.

use std::collections::BTreeMap;

use cb_output::OutputRecord;
use cb_query::{QueryFilter, ScanEngine, StatsGroup};
use cb_store::StoreRoot;

use crate::error::CacheResult;
use crate::reader::CacheReader;

/// Which source answered a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuerySource {
    Cache,
    Scan,
}

/// Routes each query to the validated cache or to the authoritative scan.
///
/// The fingerprint is checked on every query; a single query draws from
/// exactly one source, and any cache problem falls back to scan silently.
pub struct QueryRouter<'a> {
    root: &'a StoreRoot,
    use_cache: bool,
}

impl<'a> QueryRouter<'a> {
    pub fn new(root: &'a StoreRoot) -> Self {
        Self {
            root,
            use_cache: true,
        }
    }

    /// Force the scan path (`--no-cache`).
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn query_outputs(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
    ) -> CacheResult<(Vec<OutputRecord>, QuerySource)> {
        if let Some(reader) = self.reader(batch_id) {
            if let Ok(records) = reader.query_outputs(filter) {
                return Ok((records, QuerySource::Cache));
            }
            tracing::warn!(batch_id, "cache query failed; falling back to scan");
        }
        let records = ScanEngine::new(self.root).query_outputs(batch_id, filter)?;
        Ok((records, QuerySource::Scan))
    }

    pub fn query_diagnostics(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
    ) -> CacheResult<(Vec<OutputRecord>, QuerySource)> {
        if let Some(reader) = self.reader(batch_id) {
            if let Ok(records) = reader.query_diagnostics(filter) {
                return Ok((records, QuerySource::Cache));
            }
            tracing::warn!(batch_id, "cache query failed; falling back to scan");
        }
        let records = ScanEngine::new(self.root).query_diagnostics(batch_id, filter)?;
        Ok((records, QuerySource::Scan))
    }

    pub fn query_stats(
        &self,
        batch_id: &str,
        filter: &QueryFilter,
        group: StatsGroup,
    ) -> CacheResult<(BTreeMap<String, u64>, QuerySource)> {
        if let Some(reader) = self.reader(batch_id) {
            if let Ok(stats) = reader.query_stats(filter, group) {
                return Ok((stats, QuerySource::Cache));
            }
            tracing::warn!(batch_id, "cache query failed; falling back to scan");
        }
        let stats = ScanEngine::new(self.root).query_stats(batch_id, filter, group)?;
        Ok((stats, QuerySource::Scan))
    }

    fn reader(&self, batch_id: &str) -> Option<CacheReader> {
        if !self.use_cache {
            return None;
        }
        CacheReader::open_validated(self.root, batch_id)
    }
}
