//! Content, section, layout, tag and param entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification stamps shared by editable entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Audit {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A page or entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub site_id: i64,
    pub section_id: Option<i64>,

    /// Free-form kind, e.g. "article", "page"
    pub kind: String,

    pub heading: String,
    pub summary: String,
    pub body: String,

    pub draft: bool,
    pub featured: bool,

    /// Series grouping and position within it
    pub series: Option<String>,
    pub series_order: Option<i32>,

    pub published_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub audit: Audit,
}

impl Content {
    /// Drafts and entries scheduled in the future are not rendered.
    pub fn is_publishable(&self, now: DateTime<Utc>) -> bool {
        !self.draft && self.published_at.map_or(true, |at| at <= now)
    }
}

/// A grouping of content under a path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub site_id: i64,
    pub name: String,

    /// Path segment, unique within a site
    pub path: String,

    pub layout_id: Option<i64>,
}

/// Named template reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub template: String,
}

/// A tag; name is unique per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub slug: String,
}

/// Content <-> Tag association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTag {
    pub content_id: i64,
    pub tag_id: i64,
}

/// Site-scoped key/value exposed to templates.
///
/// Both `name` and `ref_key` are unique per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    pub ref_key: String,
    pub value: String,
}
