use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Tag of an output record.
///
/// The known kinds carry structured payloads the query and diff engines
/// understand; anything else is preserved verbatim as `Other` so readers
/// tolerate kinds introduced by newer executors.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    Ast,
    Diagnostic,
    Metric,
    Symbol,
    Edge,
    Other(String),
}

impl OutputKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ast => "ast",
            Self::Diagnostic => "diagnostic",
            Self::Metric => "metric",
            Self::Symbol => "symbol",
            Self::Edge => "edge",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for OutputKind {
    fn from(s: &str) -> Self {
        match s {
            "ast" => Self::Ast,
            "diagnostic" => Self::Diagnostic,
            "metric" => Self::Metric,
            "symbol" => Self::Symbol,
            "edge" => Self::Edge,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OutputKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(OutputKind::from(s.as_str()))
    }
}
