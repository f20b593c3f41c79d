//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! Settings are loaded once in `main` and passed explicitly into the
//! components that need them; nothing reads configuration globally.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sitepress::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Preview on port {}", settings.preview.port);
//! ```

mod settings;

pub use settings::*;
