//! Variable resolution: caller request → ordered, de-duplicated variable ids.
//!
//! The first resolved id is the master. Callers choose the master by putting
//! it first in an explicit list; pattern matches keep the archive's order.

use crate::archive::{ArchiveClient, ArchiveError};
use crate::domain::VariableId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSpec {
    /// `%`/`_` wildcard pattern, expanded by the archive.
    Pattern(String),
    /// Explicit names; every one must exist.
    Names(Vec<String>),
}

impl VariableSpec {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        VariableSpec::Pattern(pattern.into())
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariableSpec::Names(names.into_iter().map(Into::into).collect())
    }
}

/// Ordered resolution result; never contains the same id twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariables {
    ids: Vec<VariableId>,
}

impl ResolvedVariables {
    fn from_ordered(ids: impl IntoIterator<Item = VariableId>) -> Self {
        let mut seen = HashSet::new();
        let unique = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        Self { ids: unique }
    }

    pub fn master(&self) -> Option<&VariableId> {
        self.ids.first()
    }

    /// Everything after the master.
    pub fn peers(&self) -> &[VariableId] {
        self.ids.get(1..).unwrap_or(&[])
    }

    pub fn ids(&self) -> &[VariableId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolves a `VariableSpec` against the archive's metadata service.
pub struct VariableResolver<'a> {
    archive: &'a dyn ArchiveClient,
}

impl<'a> VariableResolver<'a> {
    pub fn new(archive: &'a dyn ArchiveClient) -> Self {
        Self { archive }
    }

    /// Resolve to ordered ids. An empty result is a normal outcome; unknown
    /// explicit names are `ArchiveError::NotFound`.
    pub fn resolve(&self, spec: &VariableSpec) -> Result<ResolvedVariables, ArchiveError> {
        match spec {
            VariableSpec::Pattern(pattern) => {
                let ids = self.archive.resolve_by_pattern(pattern)?;
                Ok(ResolvedVariables::from_ordered(ids))
            }
            VariableSpec::Names(names) if names.is_empty() => Ok(ResolvedVariables::default()),
            VariableSpec::Names(names) => {
                let found: HashSet<VariableId> =
                    self.archive.resolve_by_names(names)?.into_iter().collect();
                // exact membership, caller order
                let mut missing = Vec::new();
                let mut ordered = Vec::with_capacity(names.len());
                for name in names {
                    let id = VariableId::new(name.as_str());
                    if found.contains(&id) {
                        ordered.push(id);
                    } else {
                        missing.push(name.clone());
                    }
                }
                if !missing.is_empty() {
                    return Err(ArchiveError::NotFound { names: missing });
                }
                Ok(ResolvedVariables::from_ordered(ordered))
            }
        }
    }
}
