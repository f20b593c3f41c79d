//! # Domain Entities
//!
//! The content model the render collaborator consumes. Persistence lives
//! outside this crate; these types are what the admin backend hands over
//! as a [`SiteSnapshot`].
//!
//! ## Core Entities
//!
//! - **Site**: Tenant root, addressed by slug
//! - **Content**: A page or entry, optionally in a section and series
//! - **Section / Layout**: Path grouping and the template it renders with
//! - **Tag / Param**: Classification and template configuration
//!
//! ## Assets
//!
//! - **Image / ImageVariant**: Uploads and their renditions
//! - **ContentImage / SectionImage**: Ordered attachments

mod content;
mod image;
mod site;
mod snapshot;

pub use content::{Audit, Content, ContentTag, Layout, Param, Section, Tag};
pub use image::{ContentImage, Image, ImageVariant, SectionImage};
pub use site::{Site, SiteMode};
pub use snapshot::{SiteSnapshot, SnapshotError};
