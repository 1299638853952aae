//! JSON-over-HTTP archive binding.
//!
//! Talks to an archive gateway with a blocking reqwest client. Every request
//! carries the application id, client id and data location. There are no
//! retries: a failed call is reported once and the caller decides what to do.

use super::{ArchiveClient, ArchiveError};
use crate::domain::{
    ArchiveStamp, Dataset, FundamentalFilter, HierarchyNode, NodeId, TimeWindow, VariableId,
};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which storage tier the archive reads from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLocation {
    /// Short-term measurement store.
    #[default]
    Mdb,
    /// Long-term logging store.
    Ldb,
    /// Both, measurement store first.
    All,
}

impl DataLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLocation::Mdb => "mdb",
            DataLocation::Ldb => "ldb",
            DataLocation::All => "all",
        }
    }
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mdb" => Ok(DataLocation::Mdb),
            "ldb" => Ok(DataLocation::Ldb),
            "all" => Ok(DataLocation::All),
            other => Err(format!("unknown data location '{other}' (expected mdb, ldb or all)")),
        }
    }
}

/// Connection settings for `HttpArchive`.
#[derive(Debug, Clone)]
pub struct HttpArchiveOptions {
    pub base_url: String,
    pub app_id: String,
    pub client_id: String,
    pub location: DataLocation,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct NameList {
    variables: Vec<VariableId>,
}

#[derive(Debug, Deserialize)]
struct FundamentalList {
    #[serde(default)]
    fundamentals: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NodeList {
    nodes: Vec<HierarchyNode>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    names: &'a [String],
}

#[derive(Debug, Serialize)]
struct WindowRequest<'a> {
    variable: &'a VariableId,
    start: ArchiveStamp,
    end: ArchiveStamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    fundamentals: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
struct LastRequest<'a> {
    variable: &'a VariableId,
    at: ArchiveStamp,
}

#[derive(Debug, Serialize)]
struct AlignedRequest<'a> {
    variable: &'a VariableId,
    timestamps: &'a [ArchiveStamp],
}

/// Archive reached through an HTTP gateway.
pub struct HttpArchive {
    client: reqwest::blocking::Client,
    options: HttpArchiveOptions,
}

impl HttpArchive {
    pub fn new(options: HttpArchiveOptions) -> Result<Self, ArchiveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("timber/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArchiveError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &HttpArchiveOptions {
        &self.options
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), path)
    }

    fn with_identity(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        request
            .header("X-Application-Id", &self.options.app_id)
            .header("X-Client-Id", &self.options.client_id)
            .query(&[("location", self.options.location.as_str())])
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ArchiveError> {
        let request = self.with_identity(self.client.get(self.url(path))).query(query);
        Self::execute(request)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ArchiveError> {
        let request = self.with_identity(self.client.post(self.url(path))).json(body);
        Self::execute(request)
    }

    fn execute<T: DeserializeOwned>(
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, ArchiveError> {
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                ArchiveError::Unreachable(format!("request timed out: {e}"))
            } else {
                ArchiveError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ArchiveError::Unreachable(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(rejection(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ArchiveError::ResponseFormat(e.to_string()))
    }
}

/// Map a non-success response to an error, preferring the gateway's own message.
fn rejection(status: StatusCode, body: &str) -> ArchiveError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    if detail.is_empty() {
        ArchiveError::Rejected(format!("HTTP {status}"))
    } else {
        ArchiveError::Rejected(format!("HTTP {status}: {detail}"))
    }
}

/// Re-label a transport/format error as a fetch failure for `variable`.
fn for_variable(variable: &VariableId) -> impl FnOnce(ArchiveError) -> ArchiveError + '_ {
    move |e| match e {
        ArchiveError::Fetch { .. } => e,
        other => ArchiveError::Fetch {
            variable: variable.clone(),
            detail: other.to_string(),
        },
    }
}

/// Names that were asked for but not returned, in request order.
fn missing_names(requested: &[String], found: &[VariableId]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !found.iter().any(|id| id.as_str() == name.as_str()))
        .cloned()
        .collect()
}

impl ArchiveClient for HttpArchive {
    fn name(&self) -> &str {
        "http"
    }

    fn resolve_by_pattern(&self, pattern: &str) -> Result<Vec<VariableId>, ArchiveError> {
        let list: NameList = self.get("variables", &[("pattern", pattern.to_string())])?;
        Ok(list.variables)
    }

    fn resolve_by_names(&self, names: &[String]) -> Result<Vec<VariableId>, ArchiveError> {
        let list: NameList = self.post("variables/lookup", &LookupRequest { names })?;
        let missing = missing_names(names, &list.variables);
        if !missing.is_empty() {
            return Err(ArchiveError::NotFound { names: missing });
        }
        Ok(list.variables)
    }

    fn resolve_fundamentals(
        &self,
        pattern: &str,
        window: &TimeWindow,
    ) -> Result<Option<FundamentalFilter>, ArchiveError> {
        let end = window.end.ok_or_else(|| {
            ArchiveError::Rejected("fundamental lookup needs a closed window".into())
        })?;
        let list: FundamentalList = self.get(
            "fundamentals",
            &[
                ("pattern", pattern.to_string()),
                ("start", window.start.to_rfc3339()),
                ("end", end.to_rfc3339()),
            ],
        )?;
        if list.fundamentals.is_empty() {
            return Ok(None);
        }
        Ok(Some(FundamentalFilter {
            pattern: pattern.to_string(),
            names: list.fundamentals,
            window: *window,
        }))
    }

    fn fetch_window(
        &self,
        variable: &VariableId,
        window: &TimeWindow,
        filter: Option<&FundamentalFilter>,
    ) -> Result<Dataset, ArchiveError> {
        let end = window.end.ok_or_else(|| ArchiveError::Fetch {
            variable: variable.clone(),
            detail: "window fetch needs an end instant".into(),
        })?;
        let body = WindowRequest {
            variable,
            start: window.start.into(),
            end: end.into(),
            fundamentals: filter.map(|f| f.names.as_slice()),
        };
        self.post("data/window", &body).map_err(for_variable(variable))
    }

    fn fetch_last_before(
        &self,
        variable: &VariableId,
        instant: DateTime<Utc>,
    ) -> Result<Dataset, ArchiveError> {
        let body = LastRequest {
            variable,
            at: instant.into(),
        };
        self.post("data/last", &body).map_err(for_variable(variable))
    }

    fn fetch_aligned(
        &self,
        variable: &VariableId,
        master: &[ArchiveStamp],
    ) -> Result<Dataset, ArchiveError> {
        let body = AlignedRequest {
            variable,
            timestamps: master,
        };
        self.post("data/aligned", &body).map_err(for_variable(variable))
    }

    fn hierarchy_roots(&self) -> Result<Vec<HierarchyNode>, ArchiveError> {
        let list: NodeList = self.get("hierarchies", &[])?;
        Ok(list.nodes)
    }

    fn hierarchy_children(&self, node: &NodeId) -> Result<Vec<HierarchyNode>, ArchiveError> {
        let list: NodeList = self.get(&format!("hierarchies/{node}/children"), &[])?;
        Ok(list.nodes)
    }

    fn attached_variables(&self, node: &NodeId) -> Result<Vec<VariableId>, ArchiveError> {
        let list: NameList = self.get(&format!("hierarchies/{node}/variables"), &[])?;
        Ok(list.variables)
    }
}
