use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::sanitize::{
        BatchSanitizeRequest, BatchSanitizeResponse, SanitizeRequest, SanitizeResponse,
    },
    sanitizer::Policy,
};

/// Sanitize one HTML document with the service policy.
/// Never fails for well-formed JSON bodies: any markup yields safe output.
pub async fn sanitize_one(
    State(policy): State<Arc<Policy>>,
    Json(payload): Json<SanitizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let html = policy.clean(&payload.html);
    tracing::debug!(
        input_len = payload.html.len(),
        output_len = html.len(),
        "Sanitized document"
    );
    Ok(Json(SanitizeResponse { html }))
}

/// Sanitize a batch of documents, preserving their order.
pub async fn sanitize_batch(
    State(policy): State<Arc<Policy>>,
    Json(payload): Json<BatchSanitizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Validate payload
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // 2. Sanitize each document independently
    let documents = payload
        .documents
        .iter()
        .map(|doc| policy.clean(doc))
        .collect::<Vec<_>>();
    tracing::debug!(count = documents.len(), "Sanitized batch");

    Ok(Json(BatchSanitizeResponse { documents }))
}
