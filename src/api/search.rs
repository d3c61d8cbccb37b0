use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use super::{required, ApiError, ApiResult};
use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

pub const NO_DATA_MESSAGE: &str =
    "No repository data available. Please process the repository first.";

/// POST /api/search - Embed the query and rank the repository's fragments
/// by cosine distance.
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchResponse> {
    let Json(req) = payload?;
    let repo_id = required(&req.repo_id, "Repository ID is required")?;
    let query = required(&req.query, "Query is required")?;

    if !state.store.has_data(repo_id).await {
        return Ok(Json(SearchResponse {
            results: Vec::new(),
            message: Some(NO_DATA_MESSAGE.to_string()),
        }));
    }

    let query_vector = state
        .embedder
        .embed(query)
        .await
        .map_err(|e| ApiError::internal("Failed to search repository", &anyhow::Error::new(e)))?;

    let results = state.store.query(repo_id, &query_vector, req.top_k).await;
    tracing::info!(
        "Search in {repo_id} for {query:?}: {} results",
        results.len()
    );

    Ok(Json(SearchResponse {
        results,
        message: None,
    }))
}
