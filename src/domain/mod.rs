//! # Domain Layer
//!
//! The domain layer holds the content model and the contracts of the
//! render-preview-publish pipeline. It is independent of HTTP and of the
//! git command line.
//!
//! ## Structure
//!
//! - **entities**: Site content model (Site, Content, Section, Image, ...)
//! - **value_objects**: Immutable inputs (SiteSlug, PublisherConfig, GitAuth, PlanReport)
//! - **services**: Collaborator contracts (VcsClient, Renderer)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Secrets are redacted in every `Debug` implementation
//! - Collaborator traits define the seams used by test doubles

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
