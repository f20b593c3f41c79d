//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **SiteSlug**: Validated tenant key used in hosts and paths
//! - **GitAuth / GitIdentity / GitCommit / GitEnv**: Git invocation inputs
//! - **PublisherConfig**: Target repository and identity for a publish
//! - **PlanReport**: Dry-run summary of a publish

mod git;
mod plan;
mod publisher_config;
mod slug;

pub use git::*;
pub use plan::*;
pub use publisher_config::*;
pub use slug::*;
