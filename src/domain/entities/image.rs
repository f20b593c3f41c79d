//! Image entities and their attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub site_id: i64,
    pub file_name: String,
    pub alt_text: String,
    pub created_at: DateTime<Utc>,
}

/// A derived rendition of exactly one [`Image`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageVariant {
    pub id: i64,
    pub image_id: i64,

    /// Rendition label, e.g. "thumb", "large"
    pub kind: String,

    pub width: u32,
    pub height: u32,
    pub format: String,
    pub file_name: String,
}

/// Image attached to a content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentImage {
    pub content_id: i64,
    pub image_id: i64,
    pub position: i32,
    pub is_header: bool,
    pub is_featured: bool,
}

/// Image attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionImage {
    pub section_id: i64,
    pub image_id: i64,
    pub position: i32,
    pub is_header: bool,
    pub is_featured: bool,
}
