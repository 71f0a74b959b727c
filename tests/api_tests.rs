// tests/api_tests.rs

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use htmlguard::{config::Config, routes, sanitizer::Policy, state::AppState};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn test_state(max_input_bytes: usize) -> AppState {
    let config = Config {
        rust_log: "error".to_string(),
        max_input_bytes,
        ..Config::default()
    };
    AppState {
        policy: Arc::new(Policy::ugc()),
        config,
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let app = routes::create_router(test_state(64 * 1024));

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("random_path"));
}

#[tokio::test]
async fn health_check_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sanitize_endpoint_strips_scripts() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/sanitize", address))
        .json(&serde_json::json!({
            "html": "<p onclick=\"x()\">hi<script>alert(1)</script></p><a href=\"javascript:alert(1)\">x</a>"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["html"], "<p>hi</p><a>x</a>");
}

#[tokio::test]
async fn batch_endpoint_preserves_order() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/sanitize/batch", address))
        .json(&serde_json::json!({
            "documents": ["<b>one</b>", "<script>two</script>", "three"]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(
        body["documents"],
        serde_json::json!(["<b>one</b>", "", "three"])
    );
}

#[tokio::test]
async fn batch_endpoint_fails_validation() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send an empty batch
    let response = client
        .post(&format!("{}/api/sanitize/batch", address))
        .json(&serde_json::json!({ "documents": [] }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = routes::create_router(test_state(128));
    let payload = serde_json::json!({ "html": "x".repeat(1024) }).to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sanitize")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn sanitize_route_without_server() {
    let app = routes::create_router(test_state(64 * 1024));
    let payload = serde_json::json!({ "html": "<span><b>bold</b></span>" }).to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sanitize")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["html"], "<span><b>bold</b></span>");
}
