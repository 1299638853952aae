//! Result export: JSON, wide CSV (aligned results) and long CSV.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use timber_core::DecodedValue;

use crate::result::{AcquisitionResult, VariableEntry};

const TIME_COLUMN: &str = "timestamps";

/// Pretty JSON: `master`, `timestamps`, then `variables` keyed by id.
pub fn export_json(result: &AcquisitionResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize acquisition result to JSON")
}

/// One row per master stamp: `timestamps`, the master, then peers by id.
///
/// Failed peers get a column of empty cells so the header still lists every
/// resolved variable. A variable named like the time column is an error.
pub fn export_wide_csv(result: &AcquisitionResult) -> Result<String> {
    let Some(master) = &result.master else {
        if result.is_empty() {
            return Ok(String::new());
        }
        bail!("wide CSV needs an aligned result with a master variable");
    };

    let mut columns: Vec<(&str, Option<&[DecodedValue]>)> = Vec::with_capacity(result.len());
    let master_values = result.series(master).map(|s| s.values.as_slice());
    columns.push((master.as_str(), master_values));
    for (id, entry) in result.peers() {
        columns.push((id.as_str(), entry.series().map(|s| s.values.as_slice())));
    }

    if let Some((name, _)) = columns.iter().find(|(name, _)| *name == TIME_COLUMN) {
        bail!("variable {name} clashes with the wide CSV time column; export as JSON or long CSV");
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![TIME_COLUMN];
    header.extend(columns.iter().map(|(name, _)| *name));
    wtr.write_record(&header)?;

    for (row, ts) in result.timestamps.iter().enumerate() {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(format_instant(ts));
        for &(_, values) in &columns {
            record.push(
                values
                    .and_then(|v| v.get(row))
                    .map(format_value)
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per sample: `variable,timestamp,value`. Failed variables have no rows.
pub fn export_long_csv(result: &AcquisitionResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["variable", "timestamp", "value"])?;
    for (id, entry) in result.entries() {
        let VariableEntry::Decoded(series) = entry else {
            continue;
        };
        for (ts, value) in series.points() {
            wtr.write_record([
                id.as_str(),
                format_instant(ts).as_str(),
                format_value(value).as_str(),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn format_instant(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Cell text for one value. Gaps are empty, events are `1`, arrays are JSON.
pub fn format_value(value: &DecodedValue) -> String {
    match value {
        DecodedValue::Scalar(v) if v.is_finite() => v.to_string(),
        DecodedValue::Scalar(_) | DecodedValue::Missing => String::new(),
        DecodedValue::Event => "1".into(),
        DecodedValue::Raw(serde_json::Value::String(s)) => s.clone(),
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::VariableFailure;
    use chrono::TimeZone;
    use timber_core::{DecodeStatus, DecodedSeries, VariableKind};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_525_168_800_000 + ms).unwrap()
    }

    fn series(name: &str, stamps: &[i64], values: Vec<DecodedValue>) -> DecodedSeries {
        DecodedSeries {
            variable: name.into(),
            kind: VariableKind::Numeric,
            timestamps: Some(stamps.iter().map(|&ms| t(ms)).collect()),
            values,
            status: DecodeStatus::Complete,
        }
    }

    fn aligned() -> AcquisitionResult {
        let stamps = [0, 1_000, 1_500];
        let mut result = AcquisitionResult::aligned("B".into(), stamps.iter().map(|&ms| t(ms)).collect());
        result.insert(
            "B".into(),
            VariableEntry::Decoded(series(
                "B",
                &stamps,
                vec![DecodedValue::Scalar(1.0), DecodedValue::Scalar(2.0), DecodedValue::Scalar(3.5)],
            )),
        );
        result.insert(
            "A".into(),
            VariableEntry::Decoded(series(
                "A",
                &stamps,
                vec![DecodedValue::Missing, DecodedValue::Vector(vec![1.0, 2.0]), DecodedValue::Event],
            )),
        );
        result.insert("C".into(), VariableEntry::Failed(VariableFailure::fetch("down")));
        result
    }

    #[test]
    fn wide_csv_puts_master_first_then_sorted_peers() {
        let csv = export_wide_csv(&aligned()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamps,B,A,C");
        assert_eq!(lines[1], "2018-05-01T10:00:00Z,1,,");
        assert_eq!(lines[2], "2018-05-01T10:00:01Z,2,\"[1.0,2.0]\",");
        assert_eq!(lines[3], "2018-05-01T10:00:01.500Z,3.5,1,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn wide_csv_of_empty_result_is_empty() {
        assert_eq!(export_wide_csv(&AcquisitionResult::default()).unwrap(), "");
    }

    #[test]
    fn wide_csv_rejects_unaligned_results() {
        let mut result = AcquisitionResult::default();
        result.insert("A".into(), VariableEntry::Decoded(series("A", &[0], vec![DecodedValue::Scalar(1.0)])));
        assert!(export_wide_csv(&result).is_err());
    }

    #[test]
    fn long_csv_skips_failures() {
        let csv = export_long_csv(&aligned()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "variable,timestamp,value");
        // A (3 rows) then B (3 rows); C failed
        assert_eq!(lines.len(), 7);
        assert!(lines[1].starts_with("A,2018-05-01T10:00:00Z,"));
        assert!(!csv.contains("C,"));
    }

    #[test]
    fn json_has_timestamps_and_every_variable() {
        let json: serde_json::Value = serde_json::from_str(&export_json(&aligned()).unwrap()).unwrap();
        assert_eq!(json["timestamps"].as_array().unwrap().len(), 3);
        for key in ["A", "B", "C"] {
            assert!(json["variables"].get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn wide_csv_rejects_variable_named_like_time_column() {
        let mut result = aligned();
        result.insert(
            "timestamps".into(),
            VariableEntry::Decoded(series("timestamps", &[0], vec![DecodedValue::Scalar(1.0)])),
        );
        let err = export_wide_csv(&result).unwrap_err();
        assert!(err.to_string().contains("timestamps"), "{err}");
        // the long form has no fixed column to clash with
        assert!(export_long_csv(&result).unwrap().contains("\ntimestamps,"));
    }

    #[test]
    fn non_finite_scalars_are_blank() {
        assert_eq!(format_value(&DecodedValue::Scalar(f64::NAN)), "");
        assert_eq!(format_value(&DecodedValue::Scalar(0.25)), "0.25");
    }
}
