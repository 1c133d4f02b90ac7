//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong shared secret
    #[error("Forbidden")]
    Unauthorized,

    #[error("Bad Request: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            ApiError::MalformedInput(detail) => {
                (StatusCode::BAD_REQUEST, format!("Bad Request: {}", detail)).into_response()
            }
            ApiError::Storage(e) => {
                error!("Query failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
