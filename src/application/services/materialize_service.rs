//! Materialize Service
//!
//! Drives the [`Renderer`] into a staging directory next to the live tree
//! and swaps it in with a rename, so preview never serves a half-written
//! site.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::{SiteSnapshot, SnapshotError};
use crate::domain::services::{RenderError, RenderSummary, Renderer};
use crate::domain::value_objects::SiteSlug;
use crate::infrastructure::cache::{SiteLocks, SiteTreeRegistry};

/// Scratch area under the sites root; never resolvable as a slug
const STAGING_DIR: &str = ".staging";

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("site {0} is inactive")]
    Inactive(SiteSlug),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to swap in rendered tree: {0}")]
    Io(#[from] io::Error),
}

/// A freshly materialized tree.
#[derive(Debug, Clone, Serialize)]
pub struct Materialized {
    pub site: SiteSlug,
    pub root: PathBuf,
    pub files_written: usize,
    pub bytes_written: u64,
}

pub struct MaterializeService<R>
where
    R: Renderer,
{
    renderer: Arc<R>,
    trees: Arc<SiteTreeRegistry>,
    locks: Arc<SiteLocks>,
}

impl<R> MaterializeService<R>
where
    R: Renderer,
{
    /// `locks` must be the publisher's, so a publish never reads a tree
    /// mid-swap.
    pub fn new(renderer: Arc<R>, trees: Arc<SiteTreeRegistry>, locks: Arc<SiteLocks>) -> Self {
        Self {
            renderer,
            trees,
            locks,
        }
    }

    /// Render `snapshot` and make it the site's live tree.
    pub async fn materialize(&self, snapshot: &SiteSnapshot) -> Result<Materialized, MaterializeError> {
        let slug = snapshot.site.slug.clone();
        if !snapshot.site.active {
            return Err(MaterializeError::Inactive(slug));
        }
        snapshot.validate()?;

        let _lock = self.locks.exclusive(&slug).await;
        let run = Uuid::now_v7();
        let staging_root = self.trees.sites_root().join(STAGING_DIR);
        let staging = staging_root.join(format!("{}-{}", slug, run.simple()));
        tokio::fs::create_dir_all(&staging).await?;

        let summary = match self.renderer.render(snapshot, &staging).await {
            Ok(summary) => summary,
            Err(e) => {
                discard(&staging).await;
                tracing::warn!(site = %slug, error = %e, "Render failed, live tree untouched");
                return Err(e.into());
            }
        };

        let live = self.trees.default_root(&slug);
        let retired = staging_root.join(format!("{}-{}-old", slug, run.simple()));
        if let Err(e) = swap(&staging, &live, &retired).await {
            discard(&staging).await;
            return Err(e.into());
        }
        discard(&retired).await;

        self.trees.register(slug.clone(), live.clone());
        tracing::info!(
            site = %slug,
            files = summary.files_written,
            bytes = summary.bytes_written,
            "Site tree materialized"
        );
        Ok(materialized(slug, live, summary))
    }
}

fn materialized(site: SiteSlug, root: PathBuf, summary: RenderSummary) -> Materialized {
    Materialized {
        site,
        root,
        files_written: summary.files_written,
        bytes_written: summary.bytes_written,
    }
}

/// Move `live` aside (if present) and `staging` into its place. On failure
/// the previous tree is restored.
async fn swap(staging: &Path, live: &Path, retired: &Path) -> io::Result<()> {
    let had_live = tokio::fs::metadata(live).await.is_ok();
    if had_live {
        tokio::fs::rename(live, retired).await?;
    } else if let Some(parent) = live.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let Err(e) = tokio::fs::rename(staging, live).await {
        if had_live {
            tokio::fs::rename(retired, live).await?;
        }
        return Err(e);
    }
    Ok(())
}

async fn discard(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(error = %e, dir = %dir.display(), "Failed to remove directory");
        }
    }
}
