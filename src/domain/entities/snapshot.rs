//! Site snapshot: one site's entities, handed to the renderer as a unit.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::content::{Content, ContentTag, Layout, Param, Section, Tag};
use super::image::{ContentImage, Image, ImageVariant, SectionImage};
use super::site::Site;

/// Invariant violations found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("{entity} {id} belongs to site {found}, expected {expected}")]
    ForeignSite {
        entity: &'static str,
        id: i64,
        found: i64,
        expected: i64,
    },

    #[error("duplicate {entity} {field} {value:?}")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{entity} references missing {target} {id}")]
    DanglingReference {
        entity: &'static str,
        target: &'static str,
        id: i64,
    },
}

/// All entities of one site at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub site: Site,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub layouts: Vec<Layout>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub content_tags: Vec<ContentTag>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub image_variants: Vec<ImageVariant>,
    #[serde(default)]
    pub content_images: Vec<ContentImage>,
    #[serde(default)]
    pub section_images: Vec<SectionImage>,
}

impl SiteSnapshot {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            contents: Vec::new(),
            sections: Vec::new(),
            layouts: Vec::new(),
            tags: Vec::new(),
            content_tags: Vec::new(),
            params: Vec::new(),
            images: Vec::new(),
            image_variants: Vec::new(),
            content_images: Vec::new(),
            section_images: Vec::new(),
        }
    }

    /// Check ownership, uniqueness and referential invariants.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let site_id = self.site.id;
        let owned = |entity: &'static str, id: i64, found: i64| {
            if found == site_id {
                Ok(())
            } else {
                Err(SnapshotError::ForeignSite {
                    entity,
                    id,
                    found,
                    expected: site_id,
                })
            }
        };

        for c in &self.contents {
            owned("content", c.id, c.site_id)?;
        }
        for s in &self.sections {
            owned("section", s.id, s.site_id)?;
        }
        for l in &self.layouts {
            owned("layout", l.id, l.site_id)?;
        }
        for t in &self.tags {
            owned("tag", t.id, t.site_id)?;
        }
        for p in &self.params {
            owned("param", p.id, p.site_id)?;
        }
        for i in &self.images {
            owned("image", i.id, i.site_id)?;
        }

        unique("section", "path", self.sections.iter().map(|s| s.path.as_str()))?;
        unique("tag", "name", self.tags.iter().map(|t| t.name.as_str()))?;
        unique("param", "name", self.params.iter().map(|p| p.name.as_str()))?;
        unique("param", "ref_key", self.params.iter().map(|p| p.ref_key.as_str()))?;

        let content_ids: HashSet<i64> = self.contents.iter().map(|c| c.id).collect();
        let section_ids: HashSet<i64> = self.sections.iter().map(|s| s.id).collect();
        let layout_ids: HashSet<i64> = self.layouts.iter().map(|l| l.id).collect();
        let tag_ids: HashSet<i64> = self.tags.iter().map(|t| t.id).collect();
        let image_ids: HashSet<i64> = self.images.iter().map(|i| i.id).collect();

        for c in &self.contents {
            if let Some(section_id) = c.section_id {
                exists("content", "section", section_id, &section_ids)?;
            }
        }
        for s in &self.sections {
            if let Some(layout_id) = s.layout_id {
                exists("section", "layout", layout_id, &layout_ids)?;
            }
        }
        for ct in &self.content_tags {
            exists("content_tag", "content", ct.content_id, &content_ids)?;
            exists("content_tag", "tag", ct.tag_id, &tag_ids)?;
        }
        for v in &self.image_variants {
            exists("image_variant", "image", v.image_id, &image_ids)?;
        }
        for ci in &self.content_images {
            exists("content_image", "content", ci.content_id, &content_ids)?;
            exists("content_image", "image", ci.image_id, &image_ids)?;
        }
        for si in &self.section_images {
            exists("section_image", "section", si.section_id, &section_ids)?;
            exists("section_image", "image", si.image_id, &image_ids)?;
        }

        Ok(())
    }

    /// Remove an image together with its variants and attachments.
    ///
    /// Returns false if no such image existed.
    pub fn remove_image(&mut self, image_id: i64) -> bool {
        let before = self.images.len();
        self.images.retain(|i| i.id != image_id);
        if self.images.len() == before {
            return false;
        }
        self.image_variants.retain(|v| v.image_id != image_id);
        self.content_images.retain(|ci| ci.image_id != image_id);
        self.section_images.retain(|si| si.image_id != image_id);
        true
    }

    /// Look up a param by name or by reference key.
    pub fn param(&self, key: &str) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.name == key)
            .or_else(|| self.params.iter().find(|p| p.ref_key == key))
    }
}

fn unique<'a>(
    entity: &'static str,
    field: &'static str,
    values: impl Iterator<Item = &'a str>,
) -> Result<(), SnapshotError> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(SnapshotError::Duplicate {
                entity,
                field,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn exists(
    entity: &'static str,
    target: &'static str,
    id: i64,
    ids: &HashSet<i64>,
) -> Result<(), SnapshotError> {
    if ids.contains(&id) {
        Ok(())
    } else {
        Err(SnapshotError::DanglingReference { entity, target, id })
    }
}
