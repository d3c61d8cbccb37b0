use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::{required, ApiError, ApiResult};
use crate::explorer::{discover_endpoints, API_PROBE, API_PROBE_TOP_K};
use crate::models::{ApiExplorerResponse, RepoRequest};
use crate::state::AppState;

const API_ROOT: &str = "/api";

fn empty_response(message: &str) -> ApiExplorerResponse {
    ApiExplorerResponse {
        api_root: API_ROOT.to_string(),
        endpoints: Vec::new(),
        success: true,
        message: Some(message.to_string()),
        debug: None,
    }
}

/// POST /api/api-explorer - Describe the HTTP endpoints a repository implements
pub async fn api_explorer(
    State(state): State<AppState>,
    payload: Result<Json<RepoRequest>, JsonRejection>,
) -> ApiResult<ApiExplorerResponse> {
    let Json(req) = payload?;
    let repo_id = required(&req.repo_id, "Repository ID is required")?;

    if !state.store.has_data(repo_id).await {
        return Ok(Json(empty_response(
            "No repository data available for analysis. Please process the repository first.",
        )));
    }

    let probe = state
        .embedder
        .embed(API_PROBE)
        .await
        .map_err(|e| {
            ApiError::internal("Failed to analyze API endpoints", &anyhow::Error::new(e))
        })?;

    let hits = state.store.query(repo_id, &probe, API_PROBE_TOP_K).await;
    if hits.is_empty() {
        return Ok(Json(empty_response(
            "Unable to analyze API endpoints in this repository.",
        )));
    }

    let (endpoints, stats) = discover_endpoints(&hits);
    tracing::info!(
        "API explorer for {repo_id}: {} of {} chunks matched, {} endpoints",
        stats.filtered_chunks,
        stats.total_chunks,
        stats.endpoint_count
    );

    let message = endpoints
        .is_empty()
        .then(|| "No API endpoints detected in this repository.".to_string());

    Ok(Json(ApiExplorerResponse {
        api_root: API_ROOT.to_string(),
        endpoints,
        success: true,
        message,
        debug: Some(stats),
    }))
}
