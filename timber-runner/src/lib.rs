//! Timber Runner: acquisition coordination, worker pools, config, export.
//!
//! This crate builds on `timber-core` to provide:
//! - The `Acquirer`: aligned and independent multi-variable acquisition
//! - Bounded fetch and decode pools
//! - TOML configuration and logging initialisation
//! - JSON, wide CSV and long CSV export

pub mod acquirer;
pub mod config;
pub mod error;
pub mod export;
pub mod observability;
pub mod pool;
pub mod request;
pub mod result;

pub use acquirer::Acquirer;
pub use config::{ArchiveConfig, ConfigError, LoggingConfig, PoolConfig, TimberConfig};
pub use error::AcquireError;
pub use export::{export_json, export_long_csv, export_wide_csv};
pub use observability::{init_logging, LogFormat};
pub use pool::WorkerPools;
pub use request::AcquisitionRequest;
pub use result::{
    AcquisitionResult, FailureStage, VariableEntry, VariableFailure, VariableStatus,
};
