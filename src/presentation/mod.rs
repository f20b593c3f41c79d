//! Presentation Layer
//!
//! HTTP routes, handlers and middleware for the admin API and the preview
//! server.

pub mod http;
pub mod middleware;
