//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;
use uuid::Uuid;

use crate::application::services::PublishResult;
use crate::domain::value_objects::{PlanReport, SiteSlug};

/// Dry-run result
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub summary: String,
    pub has_changes: bool,
    #[serde(flatten)]
    pub report: PlanReport,
}

impl From<PlanReport> for PlanResponse {
    fn from(report: PlanReport) -> Self {
        Self {
            summary: report.summary(),
            has_changes: report.has_changes(),
            report,
        }
    }
}

/// Publish result
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub run_id: Uuid,
    pub site: SiteSlug,
    pub branch: String,
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_url: Option<String>,
    pub new_commit: bool,
    pub files_written: usize,
    pub files_removed: usize,
    pub files_unchanged: usize,
}

impl From<PublishResult> for PublishResponse {
    fn from(result: PublishResult) -> Self {
        let (commit, commit_url) = match result.commit {
            Some(c) => (Some(c.hash), c.url),
            None => (None, None),
        };
        Self {
            run_id: result.run_id,
            site: result.site,
            branch: result.branch,
            commit,
            commit_url,
            new_commit: result.new_commit,
            files_written: result.sync.written,
            files_removed: result.sync.removed,
            files_unchanged: result.sync.unchanged,
        }
    }
}
