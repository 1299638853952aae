//! Acquisition result: one entry per resolved variable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use timber_core::{DecodedSeries, VariableId};

/// Phase in which a variable was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Decode,
}

/// Recorded failure for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableFailure {
    pub stage: FailureStage,
    pub reason: String,
}

impl VariableFailure {
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self {
            stage: FailureStage::Fetch,
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self {
            stage: FailureStage::Decode,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VariableEntry {
    Decoded(DecodedSeries),
    Failed(VariableFailure),
}

/// Summary status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableStatus {
    Ok,
    /// Decoded, but no samples in the window.
    Empty,
    /// Decoded with raw pass-through values.
    Degraded,
    Failed,
}

impl VariableEntry {
    pub fn status(&self) -> VariableStatus {
        match self {
            VariableEntry::Failed(_) => VariableStatus::Failed,
            VariableEntry::Decoded(s) if s.is_degraded() => VariableStatus::Degraded,
            VariableEntry::Decoded(s) if s.is_empty() => VariableStatus::Empty,
            VariableEntry::Decoded(_) => VariableStatus::Ok,
        }
    }

    pub fn series(&self) -> Option<&DecodedSeries> {
        match self {
            VariableEntry::Decoded(s) => Some(s),
            VariableEntry::Failed(_) => None,
        }
    }
}

/// Everything one acquisition call produced.
///
/// For aligned calls `master` is set and `timestamps` is the master axis that
/// every successfully decoded peer shares. Non-aligned calls leave both empty
/// and each series carries its own timestamps.
///
/// Serializes as `master`, `timestamps` and a `variables` object keyed by
/// variable id, so no variable name can shadow the fixed keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcquisitionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<VariableId>,
    pub timestamps: Vec<DateTime<Utc>>,
    #[serde(rename = "variables")]
    entries: BTreeMap<VariableId, VariableEntry>,
}

impl AcquisitionResult {
    pub(crate) fn aligned(master: VariableId, timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            master: Some(master),
            timestamps,
            entries: BTreeMap::new(),
        }
    }

    /// Each variable is inserted exactly once by the coordinator.
    pub(crate) fn insert(&mut self, variable: VariableId, entry: VariableEntry) {
        let previous = self.entries.insert(variable, entry);
        debug_assert!(previous.is_none(), "variable inserted twice");
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, variable: &VariableId) -> Option<&VariableEntry> {
        self.entries.get(variable)
    }

    pub fn series(&self, variable: &VariableId) -> Option<&DecodedSeries> {
        self.get(variable).and_then(VariableEntry::series)
    }

    pub fn status(&self, variable: &VariableId) -> Option<VariableStatus> {
        self.get(variable).map(VariableEntry::status)
    }

    /// All entries, sorted by variable id.
    pub fn entries(&self) -> impl Iterator<Item = (&VariableId, &VariableEntry)> {
        self.entries.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableId> {
        self.entries.keys()
    }

    /// Every entry except the master, sorted by id.
    pub fn peers(&self) -> impl Iterator<Item = (&VariableId, &VariableEntry)> {
        self.entries
            .iter()
            .filter(move |(id, _)| Some(*id) != self.master.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&VariableId, &VariableFailure)> {
        self.entries.iter().filter_map(|(id, entry)| match entry {
            VariableEntry::Failed(f) => Some((id, f)),
            VariableEntry::Decoded(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timber_core::{DecodeStatus, DecodedValue, VariableKind};

    fn series(name: &str, values: Vec<DecodedValue>, status: DecodeStatus) -> DecodedSeries {
        DecodedSeries {
            variable: name.into(),
            kind: VariableKind::Numeric,
            timestamps: None,
            values,
            status,
        }
    }

    #[test]
    fn status_follows_entry_contents() {
        let ok = VariableEntry::Decoded(series("A", vec![DecodedValue::Scalar(1.0)], DecodeStatus::Complete));
        let empty = VariableEntry::Decoded(series("B", vec![], DecodeStatus::Complete));
        let degraded = VariableEntry::Decoded(series("C", vec![], DecodeStatus::Degraded));
        let failed = VariableEntry::Failed(VariableFailure::fetch("boom"));
        assert_eq!(ok.status(), VariableStatus::Ok);
        assert_eq!(empty.status(), VariableStatus::Empty);
        assert_eq!(degraded.status(), VariableStatus::Degraded);
        assert_eq!(failed.status(), VariableStatus::Failed);
    }

    #[test]
    fn peers_exclude_master() {
        let mut result = AcquisitionResult::aligned("B".into(), vec![]);
        result.insert("B".into(), VariableEntry::Decoded(series("B", vec![], DecodeStatus::Complete)));
        result.insert("A".into(), VariableEntry::Failed(VariableFailure::decode("bad")));
        let peers: Vec<_> = result.peers().map(|(id, _)| id.as_str()).collect();
        assert_eq!(peers, vec!["A"]);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn serializes_variables_beside_timestamps() {
        let mut result = AcquisitionResult::aligned("A".into(), vec![]);
        result.insert(
            "A".into(),
            VariableEntry::Decoded(series("A", vec![DecodedValue::Scalar(2.0)], DecodeStatus::Complete)),
        );
        result.insert("B".into(), VariableEntry::Failed(VariableFailure::fetch("timeout")));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["master"], "A");
        assert!(json["timestamps"].is_array());
        let vars = &json["variables"];
        assert_eq!(vars["A"]["outcome"], "decoded");
        assert_eq!(vars["A"]["values"][0], 2.0);
        assert_eq!(vars["B"]["outcome"], "failed");
        assert_eq!(vars["B"]["stage"], "fetch");
    }

    #[test]
    fn variables_named_like_fixed_keys_keep_their_data() {
        let stamps = vec![chrono::DateTime::<Utc>::UNIX_EPOCH];
        let mut result = AcquisitionResult::aligned("timestamps".into(), stamps);
        result.insert(
            "timestamps".into(),
            VariableEntry::Decoded(series("timestamps", vec![DecodedValue::Scalar(7.0)], DecodeStatus::Complete)),
        );
        result.insert("master".into(), VariableEntry::Failed(VariableFailure::fetch("timeout")));

        let text = serde_json::to_string(&result).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["master"], "timestamps");
        assert_eq!(json["timestamps"].as_array().unwrap().len(), 1);
        assert_eq!(json["variables"]["timestamps"]["values"][0], 7.0);
        assert_eq!(json["variables"]["master"]["stage"], "fetch");
        assert_eq!(text.matches("\"master\"").count(), 2);
    }
}
