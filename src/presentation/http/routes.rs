//! Route Configuration
//!
//! Configures the admin API router and the preview router.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, SecurityHeadersConfig, SecurityHeadersLayer};
use crate::startup::{AppState, PreviewState};

/// Create the admin API router
pub fn create_admin_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        // Outermost so headers are added to every response
        .layer(SecurityHeadersLayer::with_config(SecurityHeadersConfig::admin()))
        .with_state(state)
}

/// Create the preview router; every path goes to the preview handler
pub fn create_preview_router(state: PreviewState) -> Router {
    let security = SecurityHeadersConfig::preview().with_hsts(state.hsts);
    Router::new()
        .fallback(handlers::preview::serve)
        .layer(SecurityHeadersLayer::with_config(security))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sites/{slug}/plan", post(handlers::publish::plan))
        .route("/sites/{slug}/publish", post(handlers::publish::publish))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
