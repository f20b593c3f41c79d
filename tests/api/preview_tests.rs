//! Preview Server Tests
//!
//! Host resolution, lexical path checks and file serving through the
//! preview router.

use axum::http::{header, StatusCode};
use test_case::test_case;

use crate::common::{body_text, TestApp};

fn app_with_sites() -> TestApp {
    let app = TestApp::new();
    app.write_site(
        "test",
        &[
            ("index.html", "<h1>test home</h1>"),
            ("blog/index.html", "<h1>blog</h1>"),
            ("css/site.css", "body { color: red; }"),
            ("my page.html", "spaced"),
        ],
    );
    app.write_site("default", &[("index.html", "<h1>default</h1>")]);
    app.write_site("other", &[("index.html", "<h1>other</h1>")]);
    app
}

#[tokio::test]
async fn test_serves_site_index() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost:8080", "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(body_text(response).await, "<h1>test home</h1>");
}

#[test_case("/blog/", "<h1>blog</h1>" ; "trailing slash")]
#[test_case("/blog", "<h1>blog</h1>" ; "directory without slash")]
#[test_case("/blog/../index.html", "<h1>test home</h1>" ; "dotdot inside root")]
#[test_case("/my%20page.html", "spaced" ; "percent encoded")]
#[tokio::test]
async fn test_serves_resolved_paths(path: &str, expected: &str) {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", path).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, expected);
}

#[tokio::test]
async fn test_content_type_from_extension() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", "/css/site.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));
}

#[tokio::test]
async fn test_bare_local_host_serves_default_site() {
    let app = app_with_sites();

    let response = app.preview_get("localhost:8080", "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>default</h1>");
}

#[tokio::test]
async fn test_sites_are_isolated_by_host() {
    let app = app_with_sites();

    let response = app.preview_get("other.localhost", "/").await;

    assert_eq!(body_text(response).await, "<h1>other</h1>");
    let response = app.preview_get("other.localhost", "/blog/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_tree_is_not_found() {
    let app = TestApp::new();

    let response = app.preview_get("test.localhost:8080", "/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", "/nope.html").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "not found");
}

#[test_case("example.com" ; "foreign host")]
#[test_case("a.b.localhost" ; "nested subdomain")]
#[test_case("bad_slug.localhost" ; "invalid slug")]
#[test_case("localhost:abc" ; "bad port")]
#[tokio::test]
async fn test_unknown_host_is_bad_request(host: &str) {
    let app = app_with_sites();

    let response = app.preview_get(host, "/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_host_is_bad_request() {
    let app = app_with_sites();

    let response = app.preview_request("GET", None, "/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test_case("test.localhost" ; "site with tree")]
#[test_case("ghost.localhost" ; "site without tree")]
#[test_case("localhost" ; "default site")]
#[tokio::test]
async fn test_traversal_forbidden_for_every_site(host: &str) {
    let app = app_with_sites();

    for path in ["/../../../etc/passwd", "/%2e%2e/%2e%2e/etc/passwd", "/blog/../../secret", "/..%2f..%2fetc/passwd"] {
        let response = app.preview_get(host, path).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", host, path);
    }
}

#[tokio::test]
async fn test_traversal_cannot_reach_sibling_site() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", "/../other/index.html").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bad_encoding_is_bad_request() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", "/%ff%fe.html").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.preview_get("test.localhost", "/a%00.html").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_head_and_method_not_allowed() {
    let app = app_with_sites();

    let response = app.preview_request("HEAD", Some("test.localhost"), "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.preview_request("POST", Some("test.localhost"), "/").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
}

#[tokio::test]
async fn test_preview_security_headers() {
    let app = app_with_sites();

    let response = app.preview_get("test.localhost", "/").await;

    assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
}
