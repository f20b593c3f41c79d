//! Cache Module
//!
//! In-process state shared across requests.
//!
//! This module provides:
//! - `SiteTreeRegistry`: slug -> materialized tree root, read-mostly
//! - `SiteLocks`: per-site publish/plan serialization
//!
//! # Architecture
//!
//! ```text
//! +-------------------+       +-------------------+
//! |  Preview Handler  |       |     Publisher     |
//! +-------------------+       +-------------------+
//!          |                           |
//!          v                           v
//! +-------------------+       +-------------------+
//! | SiteTreeRegistry  |       |     SiteLocks     |
//! |  (RwLock<Map>)    |       | (DashMap<RwLock>) |
//! +-------------------+       +-------------------+
//! ```

mod site_locks;
mod site_trees;

pub use site_locks::SiteLocks;
pub use site_trees::SiteTreeRegistry;
