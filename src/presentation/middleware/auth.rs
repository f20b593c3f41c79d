//! Authentication Middleware
//!
//! Static bearer-token check for the admin API.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use sha2::{Digest, Sha256};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// Marker inserted into request extensions once the admin token matched
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller;

/// Rejects requests without `Authorization: Bearer <admin token>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    if !token_matches(bearer.token(), &state.settings.admin.token) {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request with invalid token");
        return Err(AppError::Unauthorized("Invalid token".into()));
    }

    request.extensions_mut().insert(AdminCaller);
    Ok(next.run(request).await)
}

/// Compares digests so timing does not depend on the common prefix.
fn token_matches(given: &str, expected: &str) -> bool {
    !expected.is_empty() && Sha256::digest(given.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("abc", "abc"));
        assert!(!token_matches("abd", "abc"));
        assert!(!token_matches("", ""));
    }
}
