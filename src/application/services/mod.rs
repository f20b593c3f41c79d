//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **SiteResolver**: Host header to tenant site
//! - **PreviewService**: Safe path resolution against a site's tree
//! - **PublishService**: Validate, plan and publish through a working clone
//! - **MaterializeService**: Render a snapshot and swap it in as the live tree

pub mod materialize_service;
pub mod preview_service;
pub mod publish_service;
pub mod site_resolver;

pub use materialize_service::{MaterializeError, MaterializeService, Materialized};
pub use preview_service::{clean_path, CleanPath, PathError, PreviewError, PreviewService, ServeTarget, INDEX_FILE};
pub use publish_service::{
    CommitRef, PublishError, PublishResult, PublishService, PublishServiceImpl, Stage, StageCause,
};
pub use site_resolver::{HostError, ResolvedSite, SiteResolver};
