//! Raw archive records, exactly as the archive hands them out.

use super::ids::VariableId;
use super::time::{ArchiveStamp, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared data type of an archive variable.
///
/// Serialized with the archive's own upper-case type names. Unknown names
/// are kept verbatim so they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VariableKind {
    Numeric,
    VectorNumeric,
    MatrixNumeric,
    Fundamental,
    Unrecognized(String),
}

impl VariableKind {
    pub fn as_archive_name(&self) -> &str {
        match self {
            VariableKind::Numeric => "NUMERIC",
            VariableKind::VectorNumeric => "VECTORNUMERIC",
            VariableKind::MatrixNumeric => "MATRIXNUMERIC",
            VariableKind::Fundamental => "FUNDAMENTAL",
            VariableKind::Unrecognized(name) => name,
        }
    }
}

impl From<String> for VariableKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "NUMERIC" => VariableKind::Numeric,
            "VECTORNUMERIC" => VariableKind::VectorNumeric,
            "MATRIXNUMERIC" => VariableKind::MatrixNumeric,
            "FUNDAMENTAL" => VariableKind::Fundamental,
            _ => VariableKind::Unrecognized(name),
        }
    }
}

impl From<VariableKind> for String {
    fn from(kind: VariableKind) -> Self {
        kind.as_archive_name().to_string()
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_archive_name())
    }
}

/// One archive record. A JSON `null` payload is the archive's explicit
/// "no value" marker (aligned fetches use it for gaps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub stamp: ArchiveStamp,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawSample {
    pub fn new(stamp: ArchiveStamp, payload: serde_json::Value) -> Self {
        Self { stamp, payload }
    }

    pub fn is_gap(&self) -> bool {
        self.payload.is_null()
    }
}

/// Everything the archive returned for one variable in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub variable: VariableId,
    pub kind: VariableKind,
    pub samples: Vec<RawSample>,
}

impl Dataset {
    pub fn empty(variable: VariableId, kind: VariableKind) -> Self {
        Self {
            variable,
            kind,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stamps(&self) -> Vec<ArchiveStamp> {
        self.samples.iter().map(|s| s.stamp).collect()
    }
}

/// Fundamentals matched by the archive for a pattern within a window.
/// Only ever constructed with at least one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalFilter {
    pub pattern: String,
    pub names: Vec<String>,
    pub window: TimeWindow,
}
