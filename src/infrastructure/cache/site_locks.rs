//! Per-site publish locks.
//!
//! Concurrent git operations against one working clone corrupt its index,
//! so publishes for a site run one at a time. Plans take the shared side
//! so they never observe a half-synced clone. Sites never contend with
//! each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::domain::value_objects::SiteSlug;

#[derive(Debug, Default)]
pub struct SiteLocks {
    locks: DashMap<SiteSlug, Arc<RwLock<()>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, slug: &SiteSlug) -> Arc<RwLock<()>> {
        self.locks
            .entry(slug.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Exclusive access for a publish.
    pub async fn exclusive(&self, slug: &SiteSlug) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(slug).write_owned().await
    }

    /// Shared access for a plan.
    pub async fn shared(&self, slug: &SiteSlug) -> OwnedRwLockReadGuard<()> {
        self.lock_for(slug).read_owned().await
    }

    /// True while a publish or plan holds the site.
    pub fn is_busy(&self, slug: &SiteSlug) -> bool {
        self.locks
            .get(slug)
            .map(|l| l.try_write().is_err())
            .unwrap_or(false)
    }
}
