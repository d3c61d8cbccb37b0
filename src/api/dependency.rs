use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::{required, ApiError, ApiResult};
use crate::dependency::map_dependencies;
use crate::models::{DependencyMapResponse, RepoRequest};
use crate::source::RepoRef;
use crate::state::AppState;

fn empty_response(message: &str) -> DependencyMapResponse {
    DependencyMapResponse {
        nodes: Vec::new(),
        links: Vec::new(),
        message: Some(message.to_string()),
        metadata: None,
    }
}

/// POST /api/dependency-map - File-level import graph of a processed repository
pub async fn dependency_map(
    State(state): State<AppState>,
    payload: Result<Json<RepoRequest>, JsonRejection>,
) -> ApiResult<DependencyMapResponse> {
    let Json(req) = payload?;
    let repo_id = required(&req.repo_id, "Repository ID is required")?;

    if !state.store.has_data(repo_id).await {
        return Ok(Json(empty_response(
            "No repository data available for analysis. Please process the repository first.",
        )));
    }

    let repo = RepoRef::from_id(repo_id)
        .ok_or_else(|| ApiError::bad_request("Invalid repository ID"))?;

    let files = state
        .source
        .list_files(&repo)
        .await
        .map_err(|e| ApiError::internal("Failed to analyze code dependencies", &e))?;
    if files.is_empty() {
        return Ok(Json(empty_response("No files found in the repository.")));
    }

    let graph = map_dependencies(
        state.source.as_ref(),
        &files,
        state.config.ingest.fetch_concurrency,
    )
    .await;
    tracing::info!(
        "Dependency map for {repo_id}: {} nodes, {} links",
        graph.nodes.len(),
        graph.links.len()
    );

    Ok(Json(DependencyMapResponse {
        nodes: graph.nodes,
        links: graph.links,
        message: None,
        metadata: Some(graph.metadata),
    }))
}
