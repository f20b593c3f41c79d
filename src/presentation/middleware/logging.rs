//! Request Logging
//!
//! `TraceLayer` configuration shared by both listeners.

use std::time::Duration;

use axum::{body::Body, http::Request, http::Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::{Level, Span};

type RequestSpan = fn(&Request<Body>) -> Span;
type ResponseLog = fn(&Response<Body>, Duration, &Span);

/// Span per request carrying method, path and host; one line per response.
pub fn create_trace_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, (), ResponseLog, (), (), DefaultOnFailure>
{
    TraceLayer::new_for_http()
        .make_span_with(make_span as RequestSpan)
        .on_request(())
        .on_response(on_response as ResponseLog)
        .on_body_chunk(())
        .on_eos(())
        .on_failure(DefaultOnFailure::new().level(Level::ERROR))
}

fn make_span(request: &Request<Body>) -> Span {
    let host = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "http",
        method = %request.method(),
        path = %request.uri().path(),
        host = %host,
    )
}

fn on_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    tracing::debug!(
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "response"
    );
}
