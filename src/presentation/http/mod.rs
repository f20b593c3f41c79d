//! HTTP
//!
//! Routers, handlers and extractors for both listeners.

pub mod extractors;
pub mod handlers;
pub mod routes;
