//! Preview Handler
//!
//! Serves every path of the preview listener: resolve the tenant from
//! `Host`, resolve the path lexically, then hand the file to `ServeFile`.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::application::services::{PathError, PreviewError};
use crate::infrastructure::metrics;
use crate::startup::PreviewState;

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.reason(),
        )
            .into_response()
    }
}

/// Fallback handler for the preview router
pub async fn serve(State(state): State<PreviewState>, request: Request) -> Response {
    let started = Instant::now();
    let response = if matches!(*request.method(), Method::GET | Method::HEAD) {
        serve_file(&state, request).await
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "method not allowed",
        )
            .into_response()
    };
    metrics::record_preview_request(response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

async fn serve_file(state: &PreviewState, request: Request) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));
    let path = request.uri().path().to_owned();

    let target = match state.preview.locate(host.as_deref(), &path).await {
        Ok(target) => target,
        Err(err) => {
            match &err {
                PreviewError::Path(PathError::Traversal) => {
                    tracing::warn!(
                        host = host.as_deref().unwrap_or("-"),
                        path = %path,
                        "Security: path traversal attempt rejected"
                    );
                    metrics::record_security_rejection("path_traversal");
                }
                PreviewError::Host(e) => {
                    tracing::debug!(error = %e, "Preview host not resolved");
                    metrics::record_security_rejection("invalid_host");
                }
                other => tracing::debug!(path = %path, error = %other, "Preview request not served"),
            }
            return err.into_response();
        }
    };

    tracing::debug!(site = %target.site.slug, file = %target.file.display(), "Serving preview file");
    match ServeFile::new(&target.file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
