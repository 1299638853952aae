//! Typed values produced by the sample decoder.

use super::ids::VariableId;
use super::sample::VariableKind;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Row-major, rectangular 2-D grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }
}

/// One decoded archive value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Scalar(f64),
    /// Length may differ from sample to sample.
    Vector(Vec<f64>),
    Matrix(Matrix),
    /// Fundamental presence; numerically `1`.
    Event,
    /// Archive-side "no value" marker (gap in an aligned series).
    Missing,
    /// Payload of an unrecognised kind, passed through untouched.
    Raw(serde_json::Value),
}

impl DecodedValue {
    /// Scalar view: scalars as-is, events as `1.0`, everything else `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Scalar(v) => Some(*v),
            DecodedValue::Event => Some(1.0),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DecodedValue::Missing)
    }

    /// JSON rendering used by exports. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        fn num(v: f64) -> Value {
            serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
        }
        match self {
            DecodedValue::Scalar(v) => num(*v),
            DecodedValue::Vector(vs) => Value::Array(vs.iter().copied().map(num).collect()),
            DecodedValue::Matrix(m) => Value::Array(
                (0..m.rows)
                    .filter_map(|r| m.row(r))
                    .map(|row| Value::Array(row.iter().copied().map(num).collect()))
                    .collect(),
            ),
            DecodedValue::Event => Value::from(1),
            DecodedValue::Missing => Value::Null,
            DecodedValue::Raw(v) => v.clone(),
        }
    }
}

impl Serialize for DecodedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Whether every sample decoded into its declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    Complete,
    /// The kind was unrecognised; values are raw pass-through.
    Degraded,
}

/// Decoded values for one variable, in archive order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSeries {
    pub variable: VariableId,
    pub kind: VariableKind,
    /// Present only when decoding was asked to carry timestamps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<DateTime<Utc>>>,
    pub values: Vec<DecodedValue>,
    pub status: DecodeStatus,
}

impl DecodedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        self.status == DecodeStatus::Degraded
    }

    /// `(timestamp, value)` pairs; empty when decoded without timestamps.
    pub fn points(&self) -> impl Iterator<Item = (&DateTime<Utc>, &DecodedValue)> {
        self.timestamps
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .zip(self.values.iter())
    }
}
