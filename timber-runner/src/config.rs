//! TOML configuration: archive connection, worker pools, logging.
//!
//! ```toml
//! [archive]
//! url = "https://timber.example.org/api"
//! app_id = "LHC_MD_ABP_ANALYSIS"
//! client_id = "BEAM PHYSICS"
//! source = "ldb"
//! timeout_secs = 120
//!
//! [pools]
//! fetch_threads = 16   # concurrent archive requests
//! decode_threads = 0   # 0 = one per available core
//!
//! [logging]
//! filter = "timber_runner=debug,info"
//! format = "compact"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use timber_core::archive::{DataLocation, HttpArchiveOptions};

use crate::observability::LogFormat;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimberConfig {
    pub archive: ArchiveConfig,
    pub pools: PoolConfig,
    pub logging: LoggingConfig,
}

/// Archive gateway connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    pub url: String,
    pub app_id: String,
    pub client_id: String,
    pub source: DataLocation,
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api".into(),
            app_id: "LHC_MD_ABP_ANALYSIS".into(),
            client_id: "BEAM PHYSICS".into(),
            source: DataLocation::Mdb,
            timeout_secs: 60,
        }
    }
}

/// Worker pool sizes.
///
/// Fetching is I/O-bound and limited by what the archive tolerates; decoding
/// is CPU-bound. The two pools are sized independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Upper bound on concurrent in-flight archive requests.
    pub fetch_threads: usize,
    /// Decode workers; 0 means one per available core.
    pub decode_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            fetch_threads: 8,
            decode_threads: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl TimberConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TimberConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// `<config_dir>/timber/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("timber").join("config.toml"))
    }

    /// Load from an explicit path (which must exist), else from the default
    /// path if a file is there, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archive.url.trim().is_empty() {
            return Err(ConfigError::Invalid("archive.url must not be empty".into()));
        }
        if self.archive.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "archive.timeout_secs must be at least 1".into(),
            ));
        }
        if self.pools.fetch_threads == 0 {
            return Err(ConfigError::Invalid(
                "pools.fetch_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Connection options for `HttpArchive`.
    pub fn http_options(&self) -> HttpArchiveOptions {
        HttpArchiveOptions {
            base_url: self.archive.url.clone(),
            app_id: self.archive.app_id.clone(),
            client_id: self.archive.client_id.clone(),
            location: self.archive.source,
            timeout: Duration::from_secs(self.archive.timeout_secs),
        }
    }
}
