//! Domain types shared by every layer.

pub mod hierarchy;
pub mod ids;
pub mod sample;
pub mod time;
pub mod value;

pub use hierarchy::HierarchyNode;
pub use ids::{NodeId, VariableId};
pub use sample::{Dataset, FundamentalFilter, RawSample, VariableKind};
pub use time::{parse_instant, ArchiveStamp, TimeError, TimeWindow};
pub use value::{DecodeStatus, DecodedSeries, DecodedValue, Matrix};
