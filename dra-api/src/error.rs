//! Error types for the serving API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type; missing artifacts surface as `Pipeline(Error::NotFound)`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Pipeline error, status chosen by variant
    #[error(transparent)]
    Pipeline(#[from] dra_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use dra_common::Error as E;

        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Pipeline(err) => match err {
                E::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                E::Schema(_) => (StatusCode::BAD_REQUEST, "SCHEMA_ERROR"),
                E::Parse { .. } => (StatusCode::BAD_REQUEST, "PARSE_ERROR"),
                E::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                E::Consistency(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONSISTENCY_ERROR"),
                E::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                E::Config(_) | E::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Run a synchronous pipeline call on the blocking pool
pub(crate) async fn run_blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> dra_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {}", e)))?
        .map_err(ApiError::from)
}
