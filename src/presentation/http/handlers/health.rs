//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check (backward compatible)
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (can the server accept traffic?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Basic health response (backward compatible)
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

/// Individual dependency health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub sites_root: ServiceHealth,
    pub work_root: ServiceHealth,
    pub git: ServiceHealth,
}

/// Health status for individual dependencies
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn healthy(latency_ms: Option<u64>, message: Option<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms,
            message,
        }
    }

    fn failed(status: HealthStatus, message: String) -> Self {
        Self {
            status,
            latency_ms: None,
            message: Some(message),
        }
    }
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Basic health check endpoint (backward compatible)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - checks if the server is running
/// Returns 200 if alive, used by Kubernetes to restart dead pods
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - checks if the server can accept traffic
/// Returns 200 if ready, 503 if dependencies are unavailable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();
    let started_at = SERVER_START_TIME.to_rfc3339();

    let sites_root = check_directory(state.trees.sites_root(), false).await;
    let work_root = check_directory(&state.settings.publisher.work_root, true).await;
    let git = check_git(&state).await;

    let overall_status = determine_overall_status(&[&sites_root, &work_root], &git);

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        started_at,
        checks: HealthChecks {
            sites_root,
            work_root,
            git,
        },
    };

    // Return 503 if unhealthy
    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// A directory the server reads (sites) or writes (working clones).
/// Missing directories are created; a missing sites root only degrades
/// preview, so it is reported but not fatal.
async fn check_directory(path: &Path, must_write: bool) -> ServiceHealth {
    match tokio::fs::create_dir_all(path).await {
        Ok(()) => match tokio::fs::metadata(path).await {
            Ok(meta) if must_write && meta.permissions().readonly() => ServiceHealth::failed(
                HealthStatus::Unhealthy,
                format!("{} is read-only", path.display()),
            ),
            Ok(_) => ServiceHealth::healthy(None, None),
            Err(e) => ServiceHealth::failed(HealthStatus::Unhealthy, e.to_string()),
        },
        Err(e) if must_write => ServiceHealth::failed(
            HealthStatus::Unhealthy,
            format!("Cannot create {}: {}", path.display(), e),
        ),
        Err(e) => ServiceHealth::failed(
            HealthStatus::Degraded,
            format!("Cannot create {}: {}", path.display(), e),
        ),
    }
}

/// Check the git binary runs; skipped when the publisher has no real client
async fn check_git(state: &AppState) -> ServiceHealth {
    let Some(git) = &state.git else {
        return ServiceHealth::healthy(None, Some("not configured".into()));
    };
    let start = Instant::now();
    match git.version().await {
        Ok(version) => ServiceHealth::healthy(
            Some(start.elapsed().as_millis() as u64),
            Some(version),
        ),
        Err(e) => ServiceHealth::failed(HealthStatus::Unhealthy, format!("git unavailable: {}", e)),
    }
}

/// Determine overall health based on individual checks
fn determine_overall_status(storage: &[&ServiceHealth], git: &ServiceHealth) -> HealthStatus {
    let mut overall = HealthStatus::Healthy;
    for check in storage.iter().copied().chain(std::iter::once(git)) {
        match check.status {
            HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
            HealthStatus::Degraded => overall = HealthStatus::Degraded,
            HealthStatus::Healthy => {}
        }
    }
    overall
}
