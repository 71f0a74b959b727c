// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{health, sanitize},
    state::AppState,
};

/// Assembles the main application router.
///
/// * `/api/sanitize` and `/api/sanitize/batch` run the configured policy.
/// * Applies global middleware (body limit, Trace, CORS).
/// * Injects global state (policy and configuration).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let sanitize_routes = Router::new()
        .route("/", post(sanitize::sanitize_one))
        .route("/batch", post(sanitize::sanitize_batch));

    // Batches carry several documents, so the limit applies to the body as a whole.
    let body_limit = state.config.max_input_bytes;

    Router::new()
        .nest("/api/sanitize", sanitize_routes)
        .route("/api/health", get(health::health))
        .fallback(health::not_found)
        // Global Middleware (applied from outside in)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
