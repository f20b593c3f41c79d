//! # Domain Services
//!
//! Contracts for the external collaborators the pipeline drives. They are
//! implemented in the infrastructure layer (git) or outside this crate
//! (rendering).
//!
//! ## Services
//!
//! - **VcsClient**: Clone/checkout/add/commit/push/status/log
//! - **Renderer**: Entity snapshot to static file tree

mod renderer;
mod vcs;

pub use renderer::*;
pub use vcs::*;
