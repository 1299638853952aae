//! Timber Core: archive contract, domain types, resolution, decoding, alignment.
//!
//! This crate holds everything below the acquisition coordinator:
//! - Domain types (variable ids, archive stamps, windows, raw and decoded samples)
//! - The `ArchiveClient` contract with HTTP and in-memory implementations
//! - Variable resolution (pattern or explicit list, first id is the master)
//! - Sample decoding into scalar, vector, matrix and event values
//! - Aligned retrieval against a master timestamp axis
//! - Hierarchy tree-walk

pub mod align;
pub mod archive;
pub mod decode;
pub mod domain;
pub mod hierarchy;
pub mod resolve;

pub use align::{AlignmentEngine, MasterAxis};
pub use archive::{ArchiveClient, ArchiveError, HttpArchive, MemoryArchive};
pub use decode::{decode_dataset, DecodeError};
pub use domain::{
    parse_instant, ArchiveStamp, Dataset, DecodeStatus, DecodedSeries, DecodedValue,
    FundamentalFilter, RawSample, TimeError, TimeWindow, VariableId, VariableKind,
};
pub use hierarchy::{clean_name, HierarchyWalker, Listing};
pub use resolve::{ResolvedVariables, VariableResolver, VariableSpec};
