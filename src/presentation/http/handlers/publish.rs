//! Plan and Publish Handlers

use std::path::PathBuf;

use axum::{extract::State, Json};

use crate::application::dto::{PlanResponse, PublishRequest, PublishResponse};
use crate::domain::value_objects::SiteSlug;
use crate::presentation::http::extractors::{SitePath, ValidatedJson};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Dry-run: what a publish of the site's current tree would change
pub async fn plan(
    State(state): State<AppState>,
    SitePath(site): SitePath,
    ValidatedJson(body): ValidatedJson<PublishRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let config = body.into_config();
    let ctx = state.shutdown.child_token();

    let report = state
        .publisher
        .plan(&ctx, &site, &config, &source_dir(&state, &site).await)
        .await?;
    Ok(Json(PlanResponse::from(report)))
}

/// Commit and push the site's current tree
pub async fn publish(
    State(state): State<AppState>,
    SitePath(site): SitePath,
    ValidatedJson(body): ValidatedJson<PublishRequest>,
) -> Result<Json<PublishResponse>, AppError> {
    let config = body.into_config();
    // Dropping this future (client gone) kills any running git child; the
    // token covers server shutdown.
    let ctx = state.shutdown.child_token();

    let result = state
        .publisher
        .publish(&ctx, &site, &config, &source_dir(&state, &site).await)
        .await?;
    Ok(Json(PublishResponse::from(result)))
}

/// Materialized tree of the site; a missing one is reported by the publisher.
async fn source_dir(state: &AppState, site: &SiteSlug) -> PathBuf {
    state
        .trees
        .root_for(site)
        .await
        .unwrap_or_else(|| state.trees.default_root(site))
}
