//! In-process archive backed by a JSON snapshot.
//!
//! Used by the CLI's `--fixture` mode and as the test double for the
//! acquisition layer: it counts every call per operation, tracks how many
//! fetches are in flight at once, and can be told to fail or slow down
//! fetches for individual variables.

use super::pattern::like_match;
use super::{ArchiveClient, ArchiveError};
use crate::domain::{
    ArchiveStamp, Dataset, FundamentalFilter, HierarchyNode, NodeId, RawSample, TimeWindow,
    VariableId, VariableKind,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const DEFAULT_LOOKBACK_SECS: i64 = 24 * 60 * 60;

/// One stored variable with its full recorded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVariable {
    pub name: VariableId,
    pub kind: VariableKind,
    #[serde(default)]
    pub samples: Vec<RawSample>,
}

/// One stored fundamental: a tag with the instants it fired at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFundamental {
    pub name: String,
    #[serde(default)]
    pub events: Vec<ArchiveStamp>,
}

/// One stored hierarchy node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNode {
    #[serde(flatten)]
    pub node: HierarchyNode,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub variables: Vec<VariableId>,
}

/// Serializable contents of a `MemoryArchive`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    #[serde(default)]
    pub variables: Vec<StoredVariable>,
    #[serde(default)]
    pub fundamentals: Vec<StoredFundamental>,
    #[serde(default)]
    pub hierarchy: Vec<StoredNode>,
    /// Lookback for last-value queries; one day when absent.
    #[serde(default, deserialize_with = "lookback_secs")]
    pub lookback_secs: Option<i64>,
}

/// Rejects negative lookbacks and ones chrono cannot represent.
fn lookback_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<i64>::deserialize(deserializer)? {
        Some(secs) if secs < 0 || ChronoDuration::try_seconds(secs).is_none() => Err(
            serde::de::Error::custom(format!("lookback_secs out of range: {secs}")),
        ),
        other => Ok(other),
    }
}

/// Snapshot of the per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub resolve_pattern: usize,
    pub resolve_names: usize,
    pub resolve_fundamentals: usize,
    pub fetch_window: usize,
    pub fetch_last_before: usize,
    pub fetch_aligned: usize,
    pub hierarchy: usize,
    /// Highest number of fetches observed in flight at the same time.
    pub peak_in_flight: usize,
}

impl CallStats {
    /// Calls that retrieve samples.
    pub fn fetches(&self) -> usize {
        self.fetch_window + self.fetch_last_before + self.fetch_aligned
    }

    /// Every archive call of any kind.
    pub fn total(&self) -> usize {
        self.resolve_pattern
            + self.resolve_names
            + self.resolve_fundamentals
            + self.fetches()
            + self.hierarchy
    }
}

#[derive(Debug, Default)]
struct Counters {
    resolve_pattern: AtomicUsize,
    resolve_names: AtomicUsize,
    resolve_fundamentals: AtomicUsize,
    fetch_window: AtomicUsize,
    fetch_last_before: AtomicUsize,
    fetch_aligned: AtomicUsize,
    hierarchy: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Decrements the in-flight gauge when a fetch finishes, however it finishes.
struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Archive held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    snapshot: ArchiveSnapshot,
    index: HashMap<VariableId, usize>,
    failures: HashMap<VariableId, String>,
    latency: Option<Duration>,
    counters: Counters,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot. Samples and events are sorted by stamp.
    pub fn from_snapshot(mut snapshot: ArchiveSnapshot) -> Self {
        for var in &mut snapshot.variables {
            var.samples.sort_by_key(|s| s.stamp);
        }
        for fundamental in &mut snapshot.fundamentals {
            fundamental.events.sort();
        }
        let index = snapshot
            .variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.clone(), i))
            .collect();
        Self {
            snapshot,
            index,
            ..Self::default()
        }
    }

    /// Parse a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: ArchiveSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> &ArchiveSnapshot {
        &self.snapshot
    }

    /// Add a variable. Re-adding a name replaces its history.
    pub fn with_variable(
        mut self,
        name: impl Into<VariableId>,
        kind: VariableKind,
        mut samples: Vec<RawSample>,
    ) -> Self {
        let name = name.into();
        samples.sort_by_key(|s| s.stamp);
        let stored = StoredVariable {
            name: name.clone(),
            kind,
            samples,
        };
        match self.index.get(&name) {
            Some(&i) => self.snapshot.variables[i] = stored,
            None => {
                self.index.insert(name, self.snapshot.variables.len());
                self.snapshot.variables.push(stored);
            }
        }
        self
    }

    pub fn with_fundamental(mut self, name: impl Into<String>, mut events: Vec<ArchiveStamp>) -> Self {
        events.sort();
        self.snapshot.fundamentals.push(StoredFundamental {
            name: name.into(),
            events,
        });
        self
    }

    pub fn with_node(
        mut self,
        node: HierarchyNode,
        parent: Option<NodeId>,
        variables: Vec<VariableId>,
    ) -> Self {
        self.snapshot.hierarchy.push(StoredNode {
            node,
            parent,
            variables,
        });
        self
    }

    /// Negative lookbacks are clamped to zero.
    pub fn with_lookback(mut self, lookback: ChronoDuration) -> Self {
        self.snapshot.lookback_secs = Some(lookback.num_seconds().max(0));
        self
    }

    /// Make every sample fetch for `name` fail with `detail`.
    pub fn failing(mut self, name: impl Into<VariableId>, detail: impl Into<String>) -> Self {
        self.failures.insert(name.into(), detail.into());
        self
    }

    /// Sleep this long inside every sample fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> CallStats {
        let c = &self.counters;
        CallStats {
            resolve_pattern: c.resolve_pattern.load(Ordering::SeqCst),
            resolve_names: c.resolve_names.load(Ordering::SeqCst),
            resolve_fundamentals: c.resolve_fundamentals.load(Ordering::SeqCst),
            fetch_window: c.fetch_window.load(Ordering::SeqCst),
            fetch_last_before: c.fetch_last_before.load(Ordering::SeqCst),
            fetch_aligned: c.fetch_aligned.load(Ordering::SeqCst),
            hierarchy: c.hierarchy.load(Ordering::SeqCst),
            peak_in_flight: c.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    /// `None` for a value chrono cannot represent, which leaves last-value
    /// queries without a floor.
    fn lookback(&self) -> Option<ChronoDuration> {
        let secs = self.snapshot.lookback_secs.unwrap_or(DEFAULT_LOOKBACK_SECS);
        ChronoDuration::try_seconds(secs.max(0))
    }

    /// Common prologue of every sample fetch: lookup, injected failure, latency.
    fn begin_fetch(&self, variable: &VariableId) -> Result<&StoredVariable, ArchiveError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if let Some(detail) = self.failures.get(variable) {
            return Err(ArchiveError::Fetch {
                variable: variable.clone(),
                detail: detail.clone(),
            });
        }
        self.index
            .get(variable)
            .map(|&i| &self.snapshot.variables[i])
            .ok_or_else(|| ArchiveError::Fetch {
                variable: variable.clone(),
                detail: "variable does not exist".into(),
            })
    }

    fn node(&self, id: &NodeId) -> Result<&StoredNode, ArchiveError> {
        self.snapshot
            .hierarchy
            .iter()
            .find(|n| &n.node.id == id)
            .ok_or_else(|| ArchiveError::Rejected(format!("unknown hierarchy node {id}")))
    }
}

/// Index just past the last sample at or before `stamp`.
fn upper_bound(samples: &[RawSample], stamp: ArchiveStamp) -> usize {
    samples.partition_point(|s| s.stamp <= stamp)
}

impl ArchiveClient for MemoryArchive {
    fn name(&self) -> &str {
        "memory"
    }

    fn resolve_by_pattern(&self, pattern: &str) -> Result<Vec<VariableId>, ArchiveError> {
        self.counters.resolve_pattern.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshot
            .variables
            .iter()
            .filter(|v| like_match(pattern, v.name.as_str()))
            .map(|v| v.name.clone())
            .collect())
    }

    fn resolve_by_names(&self, names: &[String]) -> Result<Vec<VariableId>, ArchiveError> {
        self.counters.resolve_names.fetch_add(1, Ordering::SeqCst);
        let mut found = Vec::with_capacity(names.len());
        let mut seen = HashSet::with_capacity(names.len());
        let mut unknown = Vec::new();
        for name in names {
            let id = VariableId::new(name.as_str());
            if self.index.contains_key(&id) {
                if seen.insert(id.clone()) {
                    found.push(id);
                }
            } else {
                unknown.push(name.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(ArchiveError::NotFound { names: unknown });
        }
        Ok(found)
    }

    fn resolve_fundamentals(
        &self,
        pattern: &str,
        window: &TimeWindow,
    ) -> Result<Option<FundamentalFilter>, ArchiveError> {
        self.counters
            .resolve_fundamentals
            .fetch_add(1, Ordering::SeqCst);
        if window.is_open() {
            return Err(ArchiveError::Rejected(
                "fundamental lookup needs a closed window".into(),
            ));
        }
        let names: Vec<String> = self
            .snapshot
            .fundamentals
            .iter()
            .filter(|f| like_match(pattern, &f.name))
            .filter(|f| f.events.iter().any(|&e| window.contains(e)))
            .map(|f| f.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        Ok(Some(FundamentalFilter {
            pattern: pattern.to_string(),
            names,
            window: *window,
        }))
    }

    fn fetch_window(
        &self,
        variable: &VariableId,
        window: &TimeWindow,
        filter: Option<&FundamentalFilter>,
    ) -> Result<Dataset, ArchiveError> {
        self.counters.fetch_window.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        let stored = self.begin_fetch(variable)?;
        if window.is_open() {
            return Err(ArchiveError::Rejected(
                "window fetch needs an end instant".into(),
            ));
        }

        let events: Option<BTreeSet<ArchiveStamp>> = filter.map(|f| {
            self.snapshot
                .fundamentals
                .iter()
                .filter(|fundamental| f.names.contains(&fundamental.name))
                .flat_map(|fundamental| fundamental.events.iter().copied())
                .collect()
        });

        let samples = stored
            .samples
            .iter()
            .filter(|s| window.contains(s.stamp))
            .filter(|s| events.as_ref().map_or(true, |ev| ev.contains(&s.stamp)))
            .cloned()
            .collect();

        Ok(Dataset {
            variable: stored.name.clone(),
            kind: stored.kind.clone(),
            samples,
        })
    }

    fn fetch_last_before(
        &self,
        variable: &VariableId,
        instant: DateTime<Utc>,
    ) -> Result<Dataset, ArchiveError> {
        self.counters.fetch_last_before.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        let stored = self.begin_fetch(variable)?;

        let at = ArchiveStamp::from(instant);
        // no floor when the lookback reaches past the earliest representable instant
        let floor = self
            .lookback()
            .and_then(|lookback| instant.checked_sub_signed(lookback))
            .map(ArchiveStamp::from);
        let end = upper_bound(&stored.samples, at);
        let samples = stored.samples[..end]
            .last()
            .filter(|s| floor.map_or(true, |floor| s.stamp >= floor))
            .cloned()
            .into_iter()
            .collect();

        Ok(Dataset {
            variable: stored.name.clone(),
            kind: stored.kind.clone(),
            samples,
        })
    }

    fn fetch_aligned(
        &self,
        variable: &VariableId,
        master: &[ArchiveStamp],
    ) -> Result<Dataset, ArchiveError> {
        self.counters.fetch_aligned.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.counters);
        let stored = self.begin_fetch(variable)?;

        let samples = master
            .iter()
            .map(|&stamp| {
                let end = upper_bound(&stored.samples, stamp);
                let payload = end
                    .checked_sub(1)
                    .map(|i| stored.samples[i].payload.clone())
                    .unwrap_or(serde_json::Value::Null);
                RawSample::new(stamp, payload)
            })
            .collect();

        Ok(Dataset {
            variable: stored.name.clone(),
            kind: stored.kind.clone(),
            samples,
        })
    }

    fn hierarchy_roots(&self) -> Result<Vec<HierarchyNode>, ArchiveError> {
        self.counters.hierarchy.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .snapshot
            .hierarchy
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.node.clone())
            .collect())
    }

    fn hierarchy_children(&self, node: &NodeId) -> Result<Vec<HierarchyNode>, ArchiveError> {
        self.counters.hierarchy.fetch_add(1, Ordering::SeqCst);
        self.node(node)?;
        Ok(self
            .snapshot
            .hierarchy
            .iter()
            .filter(|n| n.parent.as_ref() == Some(node))
            .map(|n| n.node.clone())
            .collect())
    }

    fn attached_variables(&self, node: &NodeId) -> Result<Vec<VariableId>, ArchiveError> {
        self.counters.hierarchy.fetch_add(1, Ordering::SeqCst);
        Ok(self.node(node)?.variables.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_500_000_000 + secs, 0).unwrap()
    }

    fn s(secs: i64, v: f64) -> RawSample {
        RawSample::new(t(secs).into(), json!(v))
    }

    fn archive() -> MemoryArchive {
        MemoryArchive::new()
            .with_variable("A", VariableKind::Numeric, vec![s(0, 1.0), s(10, 2.0), s(20, 3.0)])
            .with_variable("B", VariableKind::Numeric, vec![s(5, 10.0), s(15, 20.0)])
            .with_variable("AB", VariableKind::Numeric, vec![])
            .with_fundamental("CPS:NORMAL", vec![t(10).into()])
            .with_fundamental("CPS:OTHER", vec![t(500).into()])
    }

    #[test]
    fn pattern_resolution_preserves_insertion_order() {
        let ids = archive().resolve_by_pattern("A%").unwrap();
        assert_eq!(ids, vec![VariableId::from("A"), VariableId::from("AB")]);
    }

    #[test]
    fn name_resolution_keeps_caller_order_and_reports_unknowns() {
        let a = archive();
        let ids = a
            .resolve_by_names(&["B".into(), "A".into(), "B".into()])
            .unwrap();
        assert_eq!(ids, vec![VariableId::from("B"), VariableId::from("A")]);

        let err = a.resolve_by_names(&["A".into(), "Z".into()]).unwrap_err();
        assert_eq!(err, ArchiveError::NotFound { names: vec!["Z".into()] });
    }

    #[test]
    fn window_fetch_is_inclusive() {
        let w = TimeWindow::between(t(0), t(10)).unwrap();
        let ds = archive().fetch_window(&"A".into(), &w, None).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn fundamental_filter_keeps_coincident_samples() {
        let a = archive();
        let w = TimeWindow::between(t(0), t(30)).unwrap();
        let filter = a.resolve_fundamentals("CPS:%", &w).unwrap().unwrap();
        assert_eq!(filter.names, vec!["CPS:NORMAL".to_string()]);
        let ds = a.fetch_window(&"A".into(), &w, Some(&filter)).unwrap();
        assert_eq!(ds.stamps(), vec![ArchiveStamp::from(t(10))]);
    }

    #[test]
    fn no_fundamentals_in_window_is_none() {
        let w = TimeWindow::between(t(100), t(200)).unwrap();
        assert!(archive().resolve_fundamentals("CPS:%", &w).unwrap().is_none());
    }

    #[test]
    fn aligned_fetch_uses_last_value_and_null_gaps() {
        let master: Vec<ArchiveStamp> = vec![t(0).into(), t(10).into(), t(16).into()];
        let ds = archive().fetch_aligned(&"B".into(), &master).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.stamps(), master);
        assert!(ds.samples[0].is_gap());
        assert_eq!(ds.samples[1].payload, json!(10.0));
        assert_eq!(ds.samples[2].payload, json!(20.0));
    }

    #[test]
    fn last_before_respects_lookback() {
        let a = archive().with_lookback(ChronoDuration::seconds(5));
        let ds = a.fetch_last_before(&"A".into(), t(12)).unwrap();
        assert_eq!(ds.samples[0].payload, json!(2.0));
        let ds = a.fetch_last_before(&"A".into(), t(19)).unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn out_of_range_lookback_is_rejected_on_load() {
        let err = MemoryArchive::from_json(r#"{"lookback_secs": 9223372036854775807}"#).unwrap_err();
        assert!(err.to_string().contains("lookback_secs"), "{err}");
        assert!(MemoryArchive::from_json(r#"{"lookback_secs": -5}"#).is_err());
        assert!(MemoryArchive::from_json(r#"{"lookback_secs": 3600}"#).is_ok());
    }

    #[test]
    fn unrepresentable_lookback_means_no_floor() {
        let mut snapshot = archive().snapshot().clone();
        snapshot.lookback_secs = Some(i64::MAX);
        let a = MemoryArchive::from_snapshot(snapshot);
        let ds = a.fetch_last_before(&"A".into(), t(100)).unwrap();
        assert_eq!(ds.samples[0].payload, json!(3.0));
    }

    #[test]
    fn last_before_near_earliest_instant_does_not_underflow() {
        let earliest = DateTime::<Utc>::MIN_UTC;
        let a = MemoryArchive::new()
            .with_variable("A", VariableKind::Numeric, vec![RawSample::new(earliest.into(), json!(1.0))])
            .with_lookback(ChronoDuration::days(30));
        let ds = a
            .fetch_last_before(&"A".into(), earliest + ChronoDuration::hours(1))
            .unwrap();
        assert_eq!(ds.samples[0].payload, json!(1.0));

        let ds = a.fetch_last_before(&"A".into(), earliest).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn negative_lookback_is_clamped() {
        let a = archive().with_lookback(ChronoDuration::seconds(-30));
        assert_eq!(a.snapshot().lookback_secs, Some(0));
        let ds = a.fetch_last_before(&"A".into(), t(10)).unwrap();
        assert_eq!(ds.samples[0].payload, json!(2.0));
        assert!(a.fetch_last_before(&"A".into(), t(11)).unwrap().is_empty());
    }

    #[test]
    fn name_resolution_dedups_long_repeated_lists() {
        let names: Vec<String> = (0..5_000).map(|i| ["B", "A", "AB"][i % 3].to_string()).collect();
        let ids = archive().resolve_by_names(&names).unwrap();
        assert_eq!(ids, vec![VariableId::from("B"), VariableId::from("A"), VariableId::from("AB")]);
    }

    #[test]
    fn injected_failure_and_call_counting() {
        let a = archive().failing("B", "socket closed");
        let w = TimeWindow::between(t(0), t(30)).unwrap();
        let err = a.fetch_window(&"B".into(), &w, None).unwrap_err();
        assert!(matches!(err, ArchiveError::Fetch { ref detail, .. } if detail == "socket closed"));
        a.fetch_window(&"A".into(), &w, None).unwrap();
        let calls = a.calls();
        assert_eq!(calls.fetch_window, 2);
        assert_eq!(calls.fetches(), 2);
        assert_eq!(calls.total(), 2);
        assert_eq!(calls.peak_in_flight, 1);
    }

    #[test]
    fn snapshot_json_roundtrip() {
        let json = r#"{
            "variables": [
                {"name": "A", "kind": "NUMERIC",
                 "samples": [{"stamp": {"seconds": 20}, "payload": 2.0},
                             {"stamp": {"seconds": 10}, "payload": 1.0}]}
            ],
            "hierarchy": [
                {"id": "1", "name": "LHC"},
                {"id": "2", "name": "Beam Instrumentation", "parent": "1", "variables": ["A"]}
            ]
        }"#;
        let a = MemoryArchive::from_json(json).unwrap();
        let w = TimeWindow::between(t(-1_500_000_000), t(0)).unwrap();
        let ds = a.fetch_window(&"A".into(), &w, None).unwrap();
        assert_eq!(ds.samples[0].stamp, ArchiveStamp::new(10, 0));

        let roots = a.hierarchy_roots().unwrap();
        assert_eq!(roots.len(), 1);
        let kids = a.hierarchy_children(&roots[0].id).unwrap();
        assert_eq!(kids[0].name, "Beam Instrumentation");
        assert_eq!(a.attached_variables(&kids[0].id).unwrap(), vec![VariableId::from("A")]);
    }
}
