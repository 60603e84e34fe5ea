//! Index and search API endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use treeindex::{
    ClearReport, IndexService, IndexStatusReport, MatchMode, SearchHit, SearchOptions,
    SearchOutcome, StartReport, TypeFilter,
};

use crate::error::ApiError;

/// Optional JSON body carrying the root locator.
#[derive(Debug, Default, Deserialize)]
pub struct RootRequest {
    pub unc: Option<String>,
}

/// Query parameters for search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Root locator to search in.
    pub unc: Option<String>,
    /// Whitespace-separated search terms.
    pub q: Option<String>,
    pub limit: Option<usize>,
    /// "name" (default) or "path".
    #[serde(rename = "match")]
    pub match_mode: Option<String>,
    /// "all" (default), "file" or "dir".
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
    /// "1" or "true" for whole-word matching.
    pub exact: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub status: String,
    pub indexed: usize,
    pub already_running: bool,
}

impl From<StartReport> for StartResponse {
    fn from(report: StartReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            indexed: report.indexed_so_far,
            already_running: report.already_running,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub indexed: usize,
    pub errors: usize,
    /// Seconds since the build started, rounded to one decimal.
    pub elapsed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<IndexStatusReport> for StatusResponse {
    fn from(report: IndexStatusReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            indexed: report.indexed_so_far,
            errors: report.errors_so_far,
            elapsed: (report.elapsed_secs * 10.0).round() / 10.0,
            root: report.root,
            last_error: report.last_error,
            source: report.source.map(|source| source.as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub cleared: bool,
    pub will_rescan: bool,
}

impl From<ClearReport> for ClearResponse {
    fn from(report: ClearReport) -> Self {
        Self {
            cleared: report.cleared,
            will_rescan: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
}

impl From<SearchHit> for SearchResultEntry {
    fn from(hit: SearchHit) -> Self {
        Self {
            name: hit.name,
            path: hit.path,
            is_directory: hit.is_dir,
            size: hit.size,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultEntry>,
    pub truncated: bool,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_count: Option<usize>,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            results: outcome.results.into_iter().map(Into::into).collect(),
            truncated: outcome.truncated,
            source: outcome.source.as_str().to_string(),
            index_status: outcome.index_status.map(|status| status.as_str().to_string()),
            indexed_count: outcome.indexed_count,
        }
    }
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// POST /api/index
///
/// Starts a background build for `unc`; poll `/api/index/status` for
/// progress. An unreachable root answers 502.
pub(crate) async fn start_index(
    State(service): State<Arc<IndexService>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<StartResponse>, ApiError> {
    let unc = root_locator(&params, &body)?;
    let report = tokio::task::spawn_blocking(move || service.start_index(&unc))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {e}")))??;
    Ok(Json(report.into()))
}

/// GET /api/index/status
pub(crate) async fn index_status(
    State(service): State<Arc<IndexService>>,
) -> Json<StatusResponse> {
    Json(service.index_status().into())
}

/// POST /api/index/clear
///
/// Deletes the cached index for `unc`; the next build rescans the tree.
pub(crate) async fn clear_cache(
    State(service): State<Arc<IndexService>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<ClearResponse>, ApiError> {
    let unc = root_locator(&params, &body)?;
    let report = tokio::task::spawn_blocking(move || service.clear_cache(&unc))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {e}")))??;
    Ok(Json(report.into()))
}

/// GET /api/search
///
/// Searches the index for `unc`, or walks the tree live when there is none.
pub(crate) async fn search(
    State(service): State<Arc<IndexService>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let unc = required(params.unc.as_deref(), "unc")?;
    let query = required(params.q.as_deref(), "q")?;
    let options = search_options(&params, service.config().default_search_limit)?;

    let outcome = tokio::task::spawn_blocking(move || service.search(&unc, &query, &options))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {e}")))??;

    Ok(Json(outcome.into()))
}

/// Reads `unc` from the query string, falling back to a JSON body.
fn root_locator(params: &HashMap<String, String>, body: &[u8]) -> Result<String, ApiError> {
    if let Some(unc) = params.get("unc").filter(|unc| !unc.trim().is_empty()) {
        return Ok(unc.clone());
    }
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RootRequest>(body)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?
            .unc
    };
    required(from_body.as_deref(), "unc")
}

fn required(value: Option<&str>, name: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ApiError::bad_request(format!("missing parameter: {name}"))),
    }
}

fn search_options(params: &SearchParams, default_limit: usize) -> Result<SearchOptions, ApiError> {
    let match_mode = match params.match_mode.as_deref() {
        Some(raw) => MatchMode::parse(raw)?,
        None => MatchMode::default(),
    };
    let type_filter = match params.type_filter.as_deref() {
        Some(raw) => TypeFilter::parse(raw)?,
        None => TypeFilter::default(),
    };
    let exact = matches!(
        params.exact.as_deref().map(str::trim),
        Some("1") | Some("true")
    );
    Ok(SearchOptions {
        limit: params.limit.unwrap_or(default_limit),
        match_mode,
        type_filter,
        exact,
    })
}
