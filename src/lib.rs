//! # sitepress
//!
//! Render-preview-publish core of a multi-tenant static-site platform:
//! - A preview server that maps `Host` to a tenant and safely serves that
//!   tenant's rendered file tree
//! - A publisher that commits a rendered tree to a git remote through a
//!   per-site working clone, with a dry-run plan mode
//! - An admin API exposing plan/publish, health and metrics
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, value objects, and the VCS/renderer traits
//! - **Application Layer**: Resolver, preview, publish and materialize services
//! - **Infrastructure Layer**: git client, tree sync, caches, metrics
//! - **Presentation Layer**: HTTP routes, handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! sitepress/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, and service traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ git, filesystem, cache and metrics implementations
//! +-- presentation/   HTTP routes and handlers
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
