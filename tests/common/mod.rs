//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use sitepress::application::services::PublishServiceImpl;
use sitepress::config::{
    AdminSettings, CorsSettings, PreviewSettings, PublisherSettings, ServerSettings, Settings,
};
use sitepress::infrastructure::cache::{SiteLocks, SiteTreeRegistry};
use sitepress::infrastructure::git::FakeVcsClient;
use sitepress::startup::{build_routers, AppState, PreviewState};

pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789abcdef-0123";

/// Settings rooted in a scratch directory
pub fn test_settings(root: &Path) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        preview: PreviewSettings {
            host: "127.0.0.1".into(),
            port: 0,
            local_host: "localhost".into(),
            default_site: "default".into(),
            sites_root: root.join("sites"),
            hsts: false,
        },
        publisher: PublisherSettings {
            work_root: root.join("work"),
            git_binary: "git".into(),
            command_timeout_secs: 60,
            retain_failed_clones: false,
        },
        admin: AdminSettings {
            token: ADMIN_TOKEN.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        environment: "test".into(),
    }
}

/// Test application: both routers wired to a recording git double
pub struct TestApp {
    pub admin: Router,
    pub preview: Router,
    pub vcs: Arc<FakeVcsClient>,
    pub sites_root: PathBuf,
    pub shutdown: CancellationToken,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        std::fs::create_dir_all(&settings.preview.sites_root).unwrap();

        let trees = Arc::new(SiteTreeRegistry::new(&settings.preview.sites_root));
        let vcs = Arc::new(FakeVcsClient::new());
        let locks = Arc::new(SiteLocks::new());
        let publisher = PublishServiceImpl::new(
            vcs.clone(),
            locks.clone(),
            &settings.publisher.work_root,
        );
        let shutdown = CancellationToken::new();

        let preview_state = PreviewState::new(&settings, trees.clone()).unwrap();
        let state = AppState {
            publisher: Arc::new(publisher),
            trees,
            locks,
            git: None,
            settings: Arc::new(settings.clone()),
            shutdown: shutdown.clone(),
        };
        let (admin, preview) = build_routers(state, preview_state);

        Self {
            admin,
            preview,
            vcs,
            sites_root: settings.preview.sites_root,
            shutdown,
            _dir: dir,
        }
    }

    /// Write a materialized tree for `slug`
    pub fn write_site(&self, slug: &str, files: &[(&str, &str)]) {
        let root = self.sites_root.join(slug);
        for (path, contents) in files {
            let dest = root.join(path);
            std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
            std::fs::write(dest, contents).unwrap();
        }
        std::fs::create_dir_all(root).unwrap();
    }

    /// Request against the preview listener
    pub async fn preview_request(&self, method: &str, host: Option<&str>, path: &str) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(host) = host {
            builder = builder.header("Host", host);
        }
        self.preview
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn preview_get(&self, host: &str, path: &str) -> Response {
        self.preview_request("GET", Some(host), path).await
    }

    /// Make a GET request to the admin API
    pub async fn get(&self, uri: &str) -> Response {
        self.admin
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Response {
        self.admin
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(&self, uri: &str, body: &serde_json::Value) -> Response {
        self.admin
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// A valid publish request body for `repo_url`
pub fn publish_body(repo_url: &str) -> serde_json::Value {
    serde_json::json!({
        "repo_url": repo_url,
        "auth": { "method": "token", "token": "ghp_secret" },
        "identity": { "name": "Publisher", "email": "publisher@example.com" },
    })
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
