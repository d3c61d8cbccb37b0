use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::{required, ApiError, ApiResult};
use crate::ingest::ingest;
use crate::models::{
    DeleteRepoResponse, HealthResponse, ProcessRepoRequest, ProcessRepoResponse, RepoRequest,
    RepoStats,
};
use crate::source::RepoRef;
use crate::state::AppState;

/// POST /api/process-repo - Index a GitHub repository from scratch
pub async fn process_repo(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRepoRequest>, JsonRejection>,
) -> ApiResult<ProcessRepoResponse> {
    let Json(req) = payload?;
    let url = required(&req.url, "GitHub URL is required")?;

    tracing::info!("Starting processing for: {url}");

    let repo = RepoRef::parse_github_url(url).map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid GitHub URL",
            Some(e.to_string()),
        )
    })?;

    let repository = state
        .source
        .describe(&repo)
        .await
        .map_err(|e| ApiError::internal("Failed to process repository", &e))?;
    tracing::info!("Repository info retrieved: {}", repository.name);

    let report = ingest(
        state.source.as_ref(),
        state.embedder.as_ref(),
        &state.store,
        &repo,
        &state.config.ingest,
        &state.config.batch,
    )
    .await
    .map_err(|e| ApiError::internal("Failed to process repository", &e))?;

    Ok(Json(ProcessRepoResponse {
        success: true,
        repository,
        processed_files: report.processed_files,
        processed_chunks: report.processed_chunks,
        message: report.message,
    }))
}

/// POST /api/delete-repo - Drop every stored fragment of a repository
pub async fn delete_repo(
    State(state): State<AppState>,
    payload: Result<Json<RepoRequest>, JsonRejection>,
) -> ApiResult<DeleteRepoResponse> {
    let Json(req) = payload?;
    let repo_id = required(&req.repo_id, "Repository ID is required")?;

    state
        .store
        .delete_all(repo_id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete repository data", &anyhow::Error::new(e)))?;

    tracing::info!("Deleted repository data for {repo_id}");
    Ok(Json(DeleteRepoResponse { success: true }))
}

/// POST /api/repo-stats - Fragment count and last ingestion time
pub async fn repo_stats(
    State(state): State<AppState>,
    payload: Result<Json<RepoRequest>, JsonRejection>,
) -> ApiResult<RepoStats> {
    let Json(req) = payload?;
    let repo_id = required(&req.repo_id, "Repository ID is required")?;

    Ok(Json(state.store.stats(repo_id).await))
}

/// GET /api/health - Liveness plus an embedding round-trip
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let embedding = state.embedder.check_connection().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        embedding,
    })
}
