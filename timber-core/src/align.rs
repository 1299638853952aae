//! Aligned retrieval against a master timestamp axis.
//!
//! No local interpolation happens here. The archive resamples each peer onto
//! the master stamps with its own nearest-applicable-value rule and marks
//! gaps explicitly; the engine forwards whatever the archive says.

use crate::archive::{ArchiveClient, ArchiveError};
use crate::domain::{ArchiveStamp, Dataset, VariableId};
use std::time::Instant;

/// The master variable's stamps, in archive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAxis {
    pub variable: VariableId,
    pub stamps: Vec<ArchiveStamp>,
}

impl MasterAxis {
    pub fn from_dataset(master: &Dataset) -> Self {
        Self {
            variable: master.variable.clone(),
            stamps: master.stamps(),
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Fetches peers aligned to one master axis. Shareable across worker threads.
pub struct AlignmentEngine<'a> {
    archive: &'a dyn ArchiveClient,
    axis: &'a MasterAxis,
}

impl<'a> AlignmentEngine<'a> {
    pub fn new(archive: &'a dyn ArchiveClient, axis: &'a MasterAxis) -> Self {
        Self { archive, axis }
    }

    pub fn axis(&self) -> &MasterAxis {
        self.axis
    }

    /// Retrieve `variable` with one sample per master stamp.
    pub fn fetch_aligned(&self, variable: &VariableId) -> Result<Dataset, ArchiveError> {
        let started = Instant::now();
        let result = self.archive.fetch_aligned(variable, &self.axis.stamps);
        match &result {
            Ok(ds) => tracing::debug!(
                variable = %variable,
                samples = ds.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "aligned fetch complete"
            ),
            Err(e) => tracing::debug!(variable = %variable, error = %e, "aligned fetch failed"),
        }
        result
    }
}
