//! Sample decoding: raw archive payloads → typed values.
//!
//! Decoding is a pure function of its input, so decoding the same dataset
//! twice yields identical series. Kind-specific rules:
//!
//! - `NUMERIC`: one number per sample
//! - `VECTORNUMERIC`: an array of numbers (length may vary per sample)
//! - `MATRIXNUMERIC`: an array of equally long arrays of numbers
//! - `FUNDAMENTAL`: payload discarded, value is the presence marker `Event`
//! - anything else: payload passed through as `Raw`, series marked `Degraded`
//!
//! A `null` payload is the archive's gap marker and decodes to `Missing`;
//! `null` elements inside vectors and matrices decode to NaN.

use crate::domain::{
    ArchiveStamp, Dataset, DecodeStatus, DecodedSeries, DecodedValue, Matrix, VariableId,
    VariableKind,
};
use serde_json::Value;
use thiserror::Error;

/// Payload could not be decoded, not even in degraded mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{variable}: sample {index} should be {expected}, found {found}")]
    ShapeMismatch {
        variable: VariableId,
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("{variable}: sample {index} has invalid instant {stamp:?}")]
    InvalidInstant {
        variable: VariableId,
        index: usize,
        stamp: ArchiveStamp,
    },
}

/// Decode a whole dataset. `with_timestamps` also converts every sample's
/// archive stamp (seconds plus sub-second part) into a UTC datetime.
pub fn decode_dataset(dataset: &Dataset, with_timestamps: bool) -> Result<DecodedSeries, DecodeError> {
    let degraded = matches!(dataset.kind, VariableKind::Unrecognized(_));
    if degraded && !dataset.is_empty() {
        tracing::warn!(
            variable = %dataset.variable,
            kind = %dataset.kind,
            "unsupported data type, passing raw payloads through"
        );
    }

    let timestamps = if with_timestamps {
        let stamps = dataset
            .samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                sample
                    .stamp
                    .to_datetime()
                    .ok_or_else(|| DecodeError::InvalidInstant {
                        variable: dataset.variable.clone(),
                        index,
                        stamp: sample.stamp,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Some(stamps)
    } else {
        None
    };

    let values = dataset
        .samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            decode_payload(&dataset.kind, &sample.payload).map_err(|(expected, found)| {
                DecodeError::ShapeMismatch {
                    variable: dataset.variable.clone(),
                    index,
                    expected,
                    found,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedSeries {
        variable: dataset.variable.clone(),
        kind: dataset.kind.clone(),
        timestamps,
        values,
        status: if degraded {
            DecodeStatus::Degraded
        } else {
            DecodeStatus::Complete
        },
    })
}

type Mismatch = (&'static str, String);

/// Decode one payload according to the declared kind.
fn decode_payload(kind: &VariableKind, payload: &Value) -> Result<DecodedValue, Mismatch> {
    match kind {
        VariableKind::Fundamental => Ok(DecodedValue::Event),
        VariableKind::Unrecognized(_) => Ok(DecodedValue::Raw(payload.clone())),
        _ if payload.is_null() => Ok(DecodedValue::Missing),
        VariableKind::Numeric => payload
            .as_f64()
            .map(DecodedValue::Scalar)
            .ok_or_else(|| ("a number", describe(payload))),
        VariableKind::VectorNumeric => numbers(payload)
            .map(DecodedValue::Vector)
            .ok_or_else(|| ("an array of numbers", describe(payload))),
        VariableKind::MatrixNumeric => matrix(payload).map(DecodedValue::Matrix),
    }
}

/// Array of numbers, `null` elements as NaN.
fn numbers(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Null => Some(f64::NAN),
            other => other.as_f64(),
        })
        .collect()
}

fn matrix(value: &Value) -> Result<Matrix, Mismatch> {
    const EXPECTED: &str = "a rectangular array of number arrays";
    let rows = value
        .as_array()
        .ok_or_else(|| (EXPECTED, describe(value)))?;

    let mut data = Vec::new();
    let mut cols = None;
    for row in rows {
        let row = numbers(row).ok_or_else(|| (EXPECTED, describe(value)))?;
        match cols {
            None => cols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err((EXPECTED, format!("ragged rows ({n} and {})", row.len())));
            }
            Some(_) => {}
        }
        data.extend(row);
    }

    Ok(Matrix {
        rows: rows.len(),
        cols: cols.unwrap_or(0),
        data,
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(_) => "a number".into(),
        Value::String(_) => "a string".into(),
        Value::Array(a) => format!("an array of {} element(s)", a.len()),
        Value::Object(_) => "an object".into(),
    }
}
