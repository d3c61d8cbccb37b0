pub mod dependency;
pub mod explorer;
pub mod repos;
pub mod search;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// JSON error body: `{ "error": .., "message": .. }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Handler error, rendered as a status code plus [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                message,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, None)
    }

    /// 500 carrying the full error chain as `message`.
    pub fn internal(error: impl Into<String>, cause: &anyhow::Error) -> Self {
        let error = error.into();
        tracing::error!("{error}: {cause:#}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error,
            Some(format!("{cause:#}")),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            Some(rejection.body_text()),
        )
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Required string field: absent or blank is a 400 with `error`.
pub(crate) fn required<'a>(value: &'a Option<String>, error: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(error))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
}

/// All `/api` routes. Any other method on a known path answers 405.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/process-repo",
            post(repos::process_repo).fallback(method_not_allowed),
        )
        .route(
            "/api/delete-repo",
            post(repos::delete_repo).fallback(method_not_allowed),
        )
        .route(
            "/api/repo-stats",
            post(repos::repo_stats).fallback(method_not_allowed),
        )
        .route(
            "/api/search",
            post(search::search).fallback(method_not_allowed),
        )
        .route(
            "/api/api-explorer",
            post(explorer::api_explorer).fallback(method_not_allowed),
        )
        .route(
            "/api/dependency-map",
            post(dependency::dependency_map).fallback(method_not_allowed),
        )
        .route(
            "/api/health",
            get(repos::health).fallback(method_not_allowed),
        )
        .with_state(state)
}
