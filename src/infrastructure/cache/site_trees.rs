//! Slug to materialized-tree lookup.
//!
//! Reads happen on every preview request; writes only when a site is
//! re-rendered, so the map sits behind a `parking_lot::RwLock`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::domain::value_objects::SiteSlug;

/// Cached lookup of each site's materialized tree root.
#[derive(Debug)]
pub struct SiteTreeRegistry {
    sites_root: PathBuf,
    roots: RwLock<HashMap<SiteSlug, PathBuf>>,
}

impl SiteTreeRegistry {
    /// Trees default to `<sites_root>/<slug>`.
    pub fn new(sites_root: impl Into<PathBuf>) -> Self {
        Self {
            sites_root: sites_root.into(),
            roots: RwLock::new(HashMap::new()),
        }
    }

    pub fn sites_root(&self) -> &Path {
        &self.sites_root
    }

    /// Conventional location of a site's tree, whether or not it exists.
    pub fn default_root(&self, slug: &SiteSlug) -> PathBuf {
        self.sites_root.join(slug.as_str())
    }

    /// Root of a site's materialized tree, or `None` if it has never been
    /// rendered.
    pub async fn root_for(&self, slug: &SiteSlug) -> Option<PathBuf> {
        let cached = self.roots.read().get(slug).cloned();
        if let Some(root) = cached {
            if is_dir(&root).await {
                return Some(root);
            }
        }

        let candidate = self.default_root(slug);
        if is_dir(&candidate).await {
            self.roots.write().insert(slug.clone(), candidate.clone());
            Some(candidate)
        } else {
            self.roots.write().remove(slug);
            None
        }
    }

    pub fn register(&self, slug: SiteSlug, root: PathBuf) {
        tracing::debug!(site = %slug, root = %root.display(), "Registered site tree");
        self.roots.write().insert(slug, root);
    }

    pub fn evict(&self, slug: &SiteSlug) {
        self.roots.write().remove(slug);
    }

    pub fn cached_len(&self) -> usize {
        self.roots.read().len()
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn slug(s: &str) -> SiteSlug {
        SiteSlug::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_missing_tree_is_none() {
        let dir = TempDir::new().unwrap();
        let registry = SiteTreeRegistry::new(dir.path());
        assert!(registry.root_for(&slug("nothing")).await.is_none());
        assert_eq!(registry.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_default_root_discovered_and_cached() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        let registry = SiteTreeRegistry::new(dir.path());

        assert_eq!(registry.root_for(&slug("blog")).await, Some(dir.path().join("blog")));
        assert_eq!(registry.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_registered_root_wins_and_stale_entry_drops() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("elsewhere");
        std::fs::create_dir(&custom).unwrap();
        let registry = SiteTreeRegistry::new(dir.path());

        registry.register(slug("docs"), custom.clone());
        assert_eq!(registry.root_for(&slug("docs")).await, Some(custom.clone()));

        std::fs::remove_dir(&custom).unwrap();
        assert!(registry.root_for(&slug("docs")).await.is_none());
        assert_eq!(registry.cached_len(), 0);
    }
}
