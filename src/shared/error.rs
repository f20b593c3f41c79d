//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::services::{PublishError, Stage};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Failing pipeline stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Whether the same request may succeed if repeated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Field-level validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(code: u16, message: String) -> Self {
        Self {
            code,
            message,
            errors: None,
            stage: None,
            retryable: None,
        }
    }
}

fn publish_error_response(err: &PublishError) -> (StatusCode, ErrorResponse) {
    match err {
        PublishError::InvalidConfig(e) => {
            let mut body = ErrorResponse::new(10007, err.to_string());
            body.errors = Some(vec![FieldError {
                field: e.field().to_string(),
                message: e.to_string(),
            }]);
            body.retryable = Some(false);
            (StatusCode::BAD_REQUEST, body)
        }
        PublishError::SourceMissing { .. } => {
            tracing::debug!("{}", err);
            (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(10001, "Site has no rendered tree".into()),
            )
        }
        PublishError::Stage { .. } | PublishError::Cancelled { .. } => {
            let status = if matches!(err, PublishError::Cancelled { .. }) {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            };
            let mut body = ErrorResponse::new(10008, err.to_string());
            body.stage = err.stage();
            body.retryable = Some(err.is_retryable());
            (status, body)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(10001, msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new(10002, msg.clone()))
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new(10003, msg.clone()))
            }
            AppError::Validation { message, errors } => {
                let mut body = ErrorResponse::new(10007, message.clone());
                body.errors = Some(errors.clone());
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(10000, "Internal server error".into()),
                )
            }
            AppError::Publish(e) => publish_error_response(e),
        };

        (status, Json(body)).into_response()
    }
}
