//! Top-level acquisition errors.
//!
//! Only the abort cases live here. Failures of individual peer variables are
//! recorded inside the result instead (see `result::VariableFailure`).

use thiserror::Error;
use timber_core::{ArchiveError, DecodeError, TimeError, VariableId};

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown variable(s): {}", names.join(", "))]
    NotFound { names: Vec<String> },

    #[error("master variable {variable} could not be fetched: {source}")]
    MasterFetch {
        variable: VariableId,
        #[source]
        source: ArchiveError,
    },

    #[error("master variable {variable} could not be decoded: {source}")]
    MasterDecode {
        variable: VariableId,
        #[source]
        source: DecodeError,
    },

    #[error("archive error: {0}")]
    Archive(ArchiveError),

    #[error("failed to start worker pool: {0}")]
    Pool(String),
}

impl From<ArchiveError> for AcquireError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound { names } => AcquireError::NotFound { names },
            other => AcquireError::Archive(other),
        }
    }
}

impl From<TimeError> for AcquireError {
    fn from(e: TimeError) -> Self {
        AcquireError::InvalidRequest(e.to_string())
    }
}
