//! Infrastructure Layer
//!
//! Contains implementations for external concerns including:
//! - Git clients (system binary and in-memory fake)
//! - Materialized tree scanning and syncing
//! - In-process caches and locks
//! - Prometheus metrics

pub mod cache;
pub mod fs;
pub mod git;
pub mod metrics;
