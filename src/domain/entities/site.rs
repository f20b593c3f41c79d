//! Site entity.
//!
//! A site is the tenant root; every other entity belongs to exactly one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::SiteSlug;

/// How authors work with a site's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteMode {
    /// Sections, layouts and typed content
    #[default]
    Structured,
    /// Free-form pages without section routing
    Freeform,
}

/// Represents a tenant site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,

    /// Display name
    pub name: String,

    /// Globally unique, used as subdomain and tree directory name
    pub slug: SiteSlug,

    pub mode: SiteMode,

    /// Inactive sites are kept but not rendered
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(id: i64, name: impl Into<String>, slug: SiteSlug) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            slug,
            mode: SiteMode::default(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
