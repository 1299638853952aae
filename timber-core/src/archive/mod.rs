//! The archive contract and its implementations.
//!
//! `ArchiveClient` is the only external boundary of the acquisition layer.
//! Every call is blocking and potentially slow; the runner decides which
//! calls run concurrently. Implementations know nothing about alignment
//! bookkeeping, decoding or result assembly.

pub mod http;
pub mod memory;
pub mod pattern;

use crate::domain::{
    ArchiveStamp, Dataset, FundamentalFilter, HierarchyNode, NodeId, TimeWindow, VariableId,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use http::{DataLocation, HttpArchive, HttpArchiveOptions};
pub use memory::{ArchiveSnapshot, CallStats, MemoryArchive};
pub use pattern::like_match;

/// Structured errors for archive calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("archive unreachable: {0}")]
    Unreachable(String),

    #[error("unknown variable(s): {}", names.join(", "))]
    NotFound { names: Vec<String> },

    #[error("fetch failed for {variable}: {detail}")]
    Fetch { variable: VariableId, detail: String },

    #[error("archive rejected request: {0}")]
    Rejected(String),

    #[error("archive response format changed: {0}")]
    ResponseFormat(String),
}

/// Request/response contract with the remote archive.
pub trait ArchiveClient: Send + Sync {
    /// Human-readable name of this archive binding.
    fn name(&self) -> &str;

    /// Expand a `%`/`_` wildcard pattern, in the order the archive returns matches.
    fn resolve_by_pattern(&self, pattern: &str) -> Result<Vec<VariableId>, ArchiveError>;

    /// Exact lookup of each name. Fails with `NotFound` listing every unknown name.
    fn resolve_by_names(&self, names: &[String]) -> Result<Vec<VariableId>, ArchiveError>;

    /// Fundamentals matching `pattern` with at least one event inside the
    /// closed `window`. `None` means nothing matched, which is not an error.
    fn resolve_fundamentals(
        &self,
        pattern: &str,
        window: &TimeWindow,
    ) -> Result<Option<FundamentalFilter>, ArchiveError>;

    /// All samples of `variable` inside the closed `window`, optionally
    /// restricted to instants coincident with the filter's events.
    fn fetch_window(
        &self,
        variable: &VariableId,
        window: &TimeWindow,
        filter: Option<&FundamentalFilter>,
    ) -> Result<Dataset, ArchiveError>;

    /// Most recent sample at or before `instant`, within the archive's lookback.
    /// The dataset holds zero or one sample.
    fn fetch_last_before(
        &self,
        variable: &VariableId,
        instant: DateTime<Utc>,
    ) -> Result<Dataset, ArchiveError>;

    /// One sample per master stamp, in master order. Gaps carry a `null` payload.
    fn fetch_aligned(
        &self,
        variable: &VariableId,
        master: &[ArchiveStamp],
    ) -> Result<Dataset, ArchiveError>;

    /// Top-level hierarchy nodes.
    fn hierarchy_roots(&self) -> Result<Vec<HierarchyNode>, ArchiveError>;

    /// Direct children of `node`.
    fn hierarchy_children(&self, node: &NodeId) -> Result<Vec<HierarchyNode>, ArchiveError>;

    /// Variables attached to `node`.
    fn attached_variables(&self, node: &NodeId) -> Result<Vec<VariableId>, ArchiveError>;
}
