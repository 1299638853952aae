//! Acquisition coordinator.
//!
//! An aligned call runs in this order:
//!
//! 1. validate the request (no archive traffic)
//! 2. resolve variables; nothing resolved → empty result
//! 3. resolve fundamentals if asked; none matched → empty result
//! 4. fetch the master on the calling thread; failure aborts, zero samples → empty result
//! 5. decode the master and take its stamps as the alignment axis
//! 6. fan out one aligned fetch per peer on the fetch pool, then join
//! 7. fan out one decode per fetched peer on the decode pool, then join
//! 8. merge master, decoded peers and per-peer failures into the result
//!
//! Each fan-out task returns its own `(id, outcome)` pair and the coordinator
//! merges them after the join, so no task ever touches shared state.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use timber_core::{
    decode_dataset, AlignmentEngine, ArchiveClient, ArchiveError, Dataset, DecodeError,
    DecodedSeries, FundamentalFilter, HierarchyWalker, MasterAxis, TimeWindow, VariableId,
    VariableResolver,
};

use crate::config::PoolConfig;
use crate::error::AcquireError;
use crate::observability::acquire_span;
use crate::pool::WorkerPools;
use crate::request::AcquisitionRequest;
use crate::result::{AcquisitionResult, VariableEntry, VariableFailure};

/// Outcome of step 3.
enum Fundamentals {
    Unfiltered,
    Filtered(FundamentalFilter),
    NoneMatched,
}

impl Fundamentals {
    fn filter(&self) -> Option<&FundamentalFilter> {
        match self {
            Fundamentals::Filtered(f) => Some(f),
            _ => None,
        }
    }
}

type Fetched = (VariableId, Result<Dataset, ArchiveError>);
type Decoded = (VariableId, Result<DecodedSeries, DecodeError>);

/// Runs acquisition calls against one archive. Calls share nothing but the
/// archive handle and the two worker pools.
pub struct Acquirer {
    archive: Arc<dyn ArchiveClient>,
    pools: WorkerPools,
}

impl Acquirer {
    pub fn new(archive: Arc<dyn ArchiveClient>, pools: &PoolConfig) -> Result<Self, AcquireError> {
        Ok(Self {
            archive,
            pools: WorkerPools::new(pools)?,
        })
    }

    pub fn archive(&self) -> &dyn ArchiveClient {
        self.archive.as_ref()
    }

    /// Variable names matching a `%`/`_` pattern.
    pub fn search(&self, pattern: &str) -> Result<Vec<VariableId>, AcquireError> {
        Ok(self.archive.resolve_by_pattern(pattern)?)
    }

    pub fn hierarchy(&self) -> HierarchyWalker<'_> {
        HierarchyWalker::new(self.archive.as_ref())
    }

    /// Aligned acquisition: every peer is resampled onto the master's stamps.
    pub fn acquire(&self, request: &AcquisitionRequest) -> Result<AcquisitionResult, AcquireError> {
        let span = acquire_span("aligned", &request.request_id());
        let _enter = span.enter();
        let started = Instant::now();

        let Some((ids, fundamentals)) = self.prepare(request)? else {
            return Ok(AcquisitionResult::default());
        };
        let master = &ids[0];
        let peers = &ids[1..];

        let master_ds = self
            .fetch_full(master, &request.window, fundamentals.filter())
            .map_err(|source| AcquireError::MasterFetch {
                variable: master.clone(),
                source,
            })?;
        if master_ds.is_empty() {
            tracing::info!(master = %master, "master has no samples in window");
            return Ok(AcquisitionResult::default());
        }
        let master_series =
            decode_dataset(&master_ds, true).map_err(|source| AcquireError::MasterDecode {
                variable: master.clone(),
                source,
            })?;
        let axis = MasterAxis::from_dataset(&master_ds);
        tracing::info!(
            master = %master,
            samples = axis.len(),
            peers = peers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "master ready"
        );

        let mut result = AcquisitionResult::aligned(
            master.clone(),
            master_series.timestamps.clone().unwrap_or_default(),
        );
        result.insert(master.clone(), VariableEntry::Decoded(master_series));

        let engine = AlignmentEngine::new(self.archive.as_ref(), &axis);
        let fetched: Vec<Fetched> = self.pools.fetch.install(|| {
            peers
                .par_iter()
                .with_max_len(1)
                .map(|id| (id.clone(), engine.fetch_aligned(id)))
                .collect()
        });
        self.decode_and_merge(fetched, &mut result);

        tracing::info!(
            variables = result.len(),
            failed = result.failures().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aligned acquisition complete"
        );
        Ok(result)
    }

    /// Independent acquisition: every variable is fetched over the window on
    /// its own timestamps. No master, no shared axis.
    pub fn get(&self, request: &AcquisitionRequest) -> Result<AcquisitionResult, AcquireError> {
        let span = acquire_span("get", &request.request_id());
        let _enter = span.enter();
        let started = Instant::now();

        let Some((ids, fundamentals)) = self.prepare(request)? else {
            return Ok(AcquisitionResult::default());
        };

        let filter = fundamentals.filter();
        let fetched: Vec<Fetched> = self.pools.fetch.install(|| {
            ids.par_iter()
                .with_max_len(1)
                .map(|id| (id.clone(), self.fetch_full(id, &request.window, filter)))
                .collect()
        });
        let mut result = AcquisitionResult::default();
        self.decode_and_merge(fetched, &mut result);

        tracing::info!(
            variables = result.len(),
            failed = result.failures().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "acquisition complete"
        );
        Ok(result)
    }

    /// Steps 1 to 3. `None` means the call has a valid empty result.
    fn prepare(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<Option<(Vec<VariableId>, Fundamentals)>, AcquireError> {
        request.validate()?;

        let resolved = VariableResolver::new(self.archive.as_ref()).resolve(&request.spec)?;
        if resolved.is_empty() {
            tracing::info!(spec = ?request.spec, "no variables matched");
            return Ok(None);
        }
        tracing::debug!(count = resolved.len(), "variables resolved");

        let fundamentals = match &request.fundamental {
            None => Fundamentals::Unfiltered,
            Some(pattern) => match self.archive.resolve_fundamentals(pattern, &request.window)? {
                Some(filter) => {
                    tracing::debug!(pattern = %pattern, matched = filter.names.len(), "fundamentals resolved");
                    Fundamentals::Filtered(filter)
                }
                None => Fundamentals::NoneMatched,
            },
        };
        if let Fundamentals::NoneMatched = fundamentals {
            tracing::info!(pattern = ?request.fundamental, "no fundamentals in window");
            return Ok(None);
        }

        Ok(Some((resolved.ids().to_vec(), fundamentals)))
    }

    /// Window fetch, or last value at or before `start` when the window is open.
    fn fetch_full(
        &self,
        variable: &VariableId,
        window: &TimeWindow,
        filter: Option<&FundamentalFilter>,
    ) -> Result<Dataset, ArchiveError> {
        if window.is_open() {
            self.archive.fetch_last_before(variable, window.start)
        } else {
            self.archive.fetch_window(variable, window, filter)
        }
    }

    /// Records fetch failures, decodes the rest on the decode pool, merges both.
    fn decode_and_merge(&self, fetched: Vec<Fetched>, result: &mut AcquisitionResult) {
        self.decode_and_merge_with(fetched, result, |dataset| decode_dataset(dataset, true));
    }

    fn decode_and_merge_with<F>(&self, fetched: Vec<Fetched>, result: &mut AcquisitionResult, decode: F)
    where
        F: Fn(&Dataset) -> Result<DecodedSeries, DecodeError> + Send + Sync,
    {
        let started = Instant::now();
        let mut ready = Vec::with_capacity(fetched.len());
        for (id, outcome) in fetched {
            match outcome {
                Ok(dataset) => ready.push((id, dataset)),
                Err(e) => {
                    tracing::warn!(variable = %id, error = %e, "fetch failed");
                    result.insert(id, VariableEntry::Failed(VariableFailure::fetch(e.to_string())));
                }
            }
        }
        tracing::debug!(
            fetched = ready.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch phase joined"
        );

        let decoded: Vec<Decoded> = self.pools.decode.install(|| {
            ready
                .into_par_iter()
                .map(|(id, dataset)| {
                    let series = decode(&dataset);
                    (id, series)
                })
                .collect()
        });
        for (id, outcome) in decoded {
            match outcome {
                Ok(series) => result.insert(id, VariableEntry::Decoded(series)),
                Err(e) => {
                    tracing::warn!(variable = %id, error = %e, "decode failed");
                    result.insert(id, VariableEntry::Failed(VariableFailure::decode(e.to_string())));
                }
            }
        }
    }
}
