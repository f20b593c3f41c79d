//! Admin API Plan/Publish Tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pretty_assertions::assert_eq;
use sitepress::domain::services::FailureKind;
use sitepress::infrastructure::git::VcsOp;
use tower::ServiceExt;

use crate::common::{body_json, publish_body, TestApp};

const REPO: &str = "https://git.example.com/acme/test-site.git";

fn app_with_site() -> TestApp {
    let app = TestApp::new();
    app.write_site(
        "test",
        &[("index.html", "<h1>home</h1>"), ("about/index.html", "<h1>about</h1>")],
    );
    app
}

#[tokio::test]
async fn test_requires_admin_token() {
    let app = app_with_site();

    let response = app
        .post_json("/api/v1/sites/test/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.vcs.calls().is_empty());
}

#[tokio::test]
async fn test_rejects_wrong_admin_token() {
    let app = app_with_site();

    let response = app
        .admin
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sites/test/plan")
                .header("Content-Type", "application/json")
                .header("Authorization", "Bearer not-the-admin-token")
                .body(Body::from(publish_body(REPO).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_publish_returns_commit() {
    let app = app_with_site();

    let response = app
        .post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["site"], "test");
    assert_eq!(json["branch"], "main");
    assert_eq!(json["new_commit"], true);
    assert_eq!(json["files_written"], 2);
    let hash = json["commit"].as_str().unwrap().to_string();
    assert_eq!(
        json["commit_url"],
        format!("https://git.example.com/acme/test-site/commit/{}", hash)
    );
    assert_eq!(app.vcs.remote_head(REPO, "main"), Some(hash));
}

#[tokio::test]
async fn test_publish_twice_creates_one_commit() {
    let app = app_with_site();

    let first = body_json(
        app.post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
            .await,
    )
    .await;
    let second = body_json(
        app.post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
            .await,
    )
    .await;

    assert_eq!(second["new_commit"], false);
    assert_eq!(second["commit"], first["commit"]);
    assert_eq!(app.vcs.total_commits(), 1);
}

#[tokio::test]
async fn test_plan_reports_changes_without_git() {
    let app = app_with_site();

    let response = app
        .post_json_auth("/api/v1/sites/test/plan", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["has_changes"], true);
    assert_eq!(json["changes"].as_array().unwrap().len(), 2);
    assert_eq!(json["auth_method"], "token");
    assert_eq!(json["remote_url"], REPO);
    assert!(json["summary"].as_str().unwrap().contains("2 added"));
    assert!(app.vcs.calls().is_empty());
}

#[tokio::test]
async fn test_empty_repo_url_rejected_before_clone() {
    let app = app_with_site();
    let response = app
        .post_json_auth("/api/v1/sites/test/publish", &publish_body(""))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["field"], "repo_url");
    assert!(app.vcs.calls().is_empty());
}

#[tokio::test]
async fn test_inconsistent_auth_rejected_before_clone() {
    let app = app_with_site();
    let mut body = publish_body("git@git.example.com:acme/site.git");
    body["auth"] = serde_json::json!({ "method": "token", "token": "abc" });

    let response = app.post_json_auth("/api/v1/sites/test/publish", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["field"], "auth");
    assert_eq!(json["retryable"], false);
    assert!(app.vcs.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_request_body_fields() {
    let app = app_with_site();
    let mut body = publish_body(REPO);
    body["identity"]["email"] = "not-an-email".into();

    let response = app.post_json_auth("/api/v1/sites/test/publish", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["field"], "identity.email");
}

#[tokio::test]
async fn test_invalid_slug_in_path() {
    let app = app_with_site();

    let response = app
        .post_json_auth("/api/v1/sites/Bad_Slug/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_site_without_tree_is_not_found() {
    let app = TestApp::new();

    let response = app
        .post_json_auth("/api/v1/sites/ghost/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.vcs.calls().is_empty());
}

#[tokio::test]
async fn test_push_failure_names_stage() {
    let app = app_with_site();
    app.vcs
        .fail_next(VcsOp::Push, FailureKind::Network, "fatal: unable to access: Could not resolve host");

    let response = app
        .post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["stage"], "push");
    assert_eq!(json["retryable"], true);
}

#[tokio::test]
async fn test_auth_failure_not_retryable() {
    let app = app_with_site();
    app.vcs
        .fail_next(VcsOp::Clone, FailureKind::Auth, "fatal: Authentication failed");

    let response = app
        .post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["stage"], "clone");
    assert_eq!(json["retryable"], false);
    assert!(!json["message"].as_str().unwrap().contains("ghp_secret"));
}

#[tokio::test]
async fn test_shutdown_cancels_publish() {
    let app = app_with_site();
    app.shutdown.cancel();

    let response = app
        .post_json_auth("/api/v1/sites/test/publish", &publish_body(REPO))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["stage"], "clone");
    assert_eq!(json["retryable"], true);
}
