//! Archive instants, query windows, and user-facing instant parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Errors from instant parsing and window construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error(
        "unrecognised instant '{0}' (expected 'YYYY-MM-DD HH:MM:SS[.fff]', RFC 3339 or epoch seconds)"
    )]
    Unparseable(String),

    #[error("window end {end} is before start {start}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The archive's native instant: epoch seconds plus a sub-second component.
///
/// Kept separate from `DateTime<Utc>` so that master stamps can be handed
/// back to the archive for aligned fetches exactly as they were received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveStamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: u32,
}

impl ArchiveStamp {
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Build a stamp from epoch milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: millis.rem_euclid(1000) as u32 * 1_000_000,
        }
    }

    /// Convert to a UTC datetime. `None` if the sub-second part is out of
    /// range or the seconds overflow chrono's representable span.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.nanos >= NANOS_PER_SEC {
            return None;
        }
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for ArchiveStamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            // leap-second representation would otherwise exceed one second
            nanos: dt.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1),
        }
    }
}

/// Query window: inclusive start, optional inclusive end.
///
/// A window without an end asks for the most recent value at or before
/// `start`, within the archive's bounded lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Closed window `[start, end]`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if end < start {
            return Err(TimeError::Inverted { start, end });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Open window: last value at or before `start`.
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether `stamp` falls inside a closed window. Always false for open windows.
    pub fn contains(&self, stamp: ArchiveStamp) -> bool {
        match self.end {
            Some(end) => stamp >= self.start.into() && stamp <= end.into(),
            None => false,
        }
    }
}

/// Parse a user-supplied instant.
///
/// Accepted forms, all interpreted as UTC:
/// - `YYYY-MM-DD HH:MM:SS` with optional fractional seconds
/// - `YYYY-MM-DD` (midnight)
/// - RFC 3339 (`2018-05-01T10:00:00.5+02:00`)
/// - epoch seconds, optionally fractional (`1525168800.25`)
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, TimeError> {
    let s = input.trim();

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(epoch) = s.parse::<f64>() {
        if epoch.is_finite() {
            let seconds = epoch.floor();
            let nanos = (((epoch - seconds) * 1e9).round() as u32).min(NANOS_PER_SEC - 1);
            if let Some(dt) = DateTime::from_timestamp(seconds as i64, nanos) {
                return Ok(dt);
            }
        }
    }

    Err(TimeError::Unparseable(input.to_string()))
}
