//! Render collaborator contract.
//!
//! The templating engine lives outside this crate. It receives a validated
//! [`SiteSnapshot`] and writes a complete static tree into `out_dir`.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::entities::SiteSnapshot;

/// Counters reported by a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub files_written: usize,
    pub bytes_written: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template {template} failed: {message}")]
    Template { template: String, message: String },

    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a site's entities into files.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Write the full tree for `snapshot` into `out_dir`, which exists and
    /// is empty.
    async fn render(
        &self,
        snapshot: &SiteSnapshot,
        out_dir: &Path,
    ) -> Result<RenderSummary, RenderError>;
}
