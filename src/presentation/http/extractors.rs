//! Custom Extractors
//!
//! Axum extractors for path and body parsing.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::domain::value_objects::SiteSlug;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;

/// `{slug}` path segment parsed as a [`SiteSlug`]
#[derive(Debug, Clone)]
pub struct SitePath(pub SiteSlug);

impl<S> FromRequestParts<S> for SitePath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        SiteSlug::parse(&raw)
            .map(SitePath)
            .map_err(|e| AppError::BadRequest(format!("Invalid site slug: {}", e)))
    }
}

/// JSON body that passed `validator` checks
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate().map_err(validation_error)?;
        Ok(Self(value))
    }
}
