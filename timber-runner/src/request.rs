//! Serializable acquisition request.

use serde::{Deserialize, Serialize};
use timber_core::{TimeWindow, VariableSpec};

use crate::error::AcquireError;

/// Everything needed to repeat an acquisition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRequest {
    pub spec: VariableSpec,
    pub window: TimeWindow,
    /// Fundamental tag pattern; requires a window end.
    pub fundamental: Option<String>,
}

impl AcquisitionRequest {
    pub fn new(spec: VariableSpec, window: TimeWindow) -> Self {
        Self {
            spec,
            window,
            fundamental: None,
        }
    }

    pub fn with_fundamental(mut self, pattern: impl Into<String>) -> Self {
        self.fundamental = Some(pattern.into());
        self
    }

    /// Checks that need no archive access.
    pub fn validate(&self) -> Result<(), AcquireError> {
        if self.fundamental.is_some() && self.window.end.is_none() {
            return Err(AcquireError::InvalidRequest(
                "filtering by fundamentals needs an explicit window end".into(),
            ));
        }
        if let Some(end) = self.window.end {
            if end < self.window.start {
                return Err(AcquireError::InvalidRequest(format!(
                    "window end {end} is before start {}",
                    self.window.start
                )));
            }
        }
        Ok(())
    }

    /// Short content hash used to correlate log lines of one call.
    /// Uses BLAKE3 for a stable hash across builds/platforms.
    pub fn request_id(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let hash = blake3::hash(&canonical).to_hex();
        hash[..16].to_string()
    }
}
