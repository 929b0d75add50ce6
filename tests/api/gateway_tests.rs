//! WebSocket Gateway Handshake Tests

use axum::http::StatusCode;

use crate::common::TestApp;

#[tokio::test]
async fn test_gateway_without_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.get("/gateway").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_with_invalid_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.get("/gateway?token=not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_opens_no_session_when_rejected() {
    let app = TestApp::new();

    app.get_auth("/gateway", "garbage").await;

    assert_eq!(app.harness.bus.subscriber_count(), 0);
}
