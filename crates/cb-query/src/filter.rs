use std::str::FromStr;

use cb_output::OutputRecord;
use cb_types::{OutputKind, Severity};

/// Filters applied to output queries. Empty filter matches everything.
#[derive(Clone, Debug, Default)]
pub struct QueryFilter {
    /// Restrict to one task; `None` scans every task in the plan.
    pub task: Option<String>,
    pub kind: Option<OutputKind>,
    /// Case-insensitive substring match on the record path.
    pub path: Option<String>,
    pub severity: Option<Severity>,
    pub code: Option<String>,
}

impl QueryFilter {
    pub fn matches(&self, record: &OutputRecord) -> bool {
        if let Some(kind) = &self.kind {
            if record.kind != *kind {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !record.path.to_lowercase().contains(&path.to_lowercase()) {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if record.payload.severity != Some(severity) {
                return false;
            }
        }
        if let Some(code) = &self.code {
            if record.payload.code.as_deref() != Some(code.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Grouping axis for `query_stats`.
///
/// `Kind` and `Lang` count every record; `Severity` and `Code` count
/// diagnostics only, mirroring what the cache pre-aggregates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsGroup {
    Kind,
    Severity,
    Code,
    Lang,
}

impl StatsGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kind => "kind",
            Self::Severity => "severity",
            Self::Code => "code",
            Self::Lang => "lang",
        }
    }
}

impl FromStr for StatsGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kind" => Ok(Self::Kind),
            "severity" => Ok(Self::Severity),
            "code" => Ok(Self::Code),
            "lang" => Ok(Self::Lang),
            other => Err(format!("unknown stats group: {other}")),
        }
    }
}
