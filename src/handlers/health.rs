use axum::{Json, http::Uri, response::IntoResponse};
use serde_json::json;

use crate::error::AppError;

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Fallback for unknown routes, returned as a JSON error.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
