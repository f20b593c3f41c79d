//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{body_json, body_text, TestApp};

/// Test basic health check endpoint returns 200 OK
#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

/// Liveness never depends on the filesystem or git
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
}

/// Readiness reports each check; without a real git client it is skipped
#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new();

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["work_root"]["status"], "healthy");
    assert_eq!(json["checks"]["git"]["message"], "not configured");
}

#[tokio::test]
async fn test_metrics_exposed_without_auth() {
    let app = TestApp::new();
    app.write_site("metrics", &[("index.html", "x")]);
    app.preview_get("metrics.localhost", "/").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("sitepress_preview_requests_total"));
}

#[tokio::test]
async fn test_admin_security_headers() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
