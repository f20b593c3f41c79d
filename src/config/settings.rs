//! Application settings and configuration structures.

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::value_objects::SiteSlug;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Admin API binding (plan/publish, health, metrics)
    pub server: ServerSettings,

    /// Preview server binding and tenant resolution
    pub preview: PreviewSettings,

    /// Working clones and git invocation
    pub publisher: PublisherSettings,

    /// Admin API authentication
    pub admin: AdminSettings,

    /// CORS configuration for the admin API
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Preview server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewSettings {
    pub host: String,
    pub port: u16,

    /// Local development host; `<slug>.<local_host>` selects a site
    pub local_host: String,

    /// Site served for the bare local host
    pub default_site: String,

    /// Directory holding one materialized tree per site slug
    pub sites_root: PathBuf,

    /// Send HSTS on preview responses (only behind TLS)
    pub hsts: bool,
}

/// Publisher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherSettings {
    /// Directory holding per-site working clones
    pub work_root: PathBuf,

    /// Path or name of the git executable
    pub git_binary: String,

    /// Upper bound for a single git invocation in seconds
    pub command_timeout_secs: u64,

    /// Keep clones whose checkout failed, for diagnostics
    pub retain_failed_clones: bool,
}

/// Admin API authentication.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    /// Bearer token required on `/api/v1` routes
    pub token: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Minimum required length for the admin token (256 bits = 32 bytes)
pub const MIN_ADMIN_TOKEN_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// if the admin token is too short, or if the default site is not a
    /// valid slug.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("preview.host", "0.0.0.0")?
            .set_default("preview.port", 8080)?
            .set_default("preview.local_host", "localhost")?
            .set_default("preview.default_site", "default")?
            .set_default("preview.sites_root", "data/sites")?
            .set_default("preview.hsts", false)?
            .set_default("publisher.work_root", "data/work")?
            .set_default("publisher.git_binary", "git")?
            .set_default("publisher.command_timeout_secs", 300)?
            .set_default("publisher.retain_failed_clones", false)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__PREVIEW__PORT=8080 -> preview.port = 8080
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.port", std::env::var("ADMIN_PORT").ok())?
            .set_override_option("preview.port", std::env::var("PREVIEW_PORT").ok())?
            .set_override_option("preview.sites_root", std::env::var("SITES_ROOT").ok())?
            .set_override_option("publisher.work_root", std::env::var("WORK_ROOT").ok())?
            .set_override_option("admin.token", std::env::var("ADMIN_TOKEN").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Checks that cannot be expressed as serde types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.token.len() < MIN_ADMIN_TOKEN_LENGTH {
            return Err(ConfigError::Message(format!(
                "Admin token must be at least {} characters for security. Current length: {}",
                MIN_ADMIN_TOKEN_LENGTH,
                self.admin.token.len()
            )));
        }
        SiteSlug::parse(&self.preview.default_site).map_err(|e| {
            ConfigError::Message(format!("preview.default_site is not a valid slug: {}", e))
        })?;
        if self.preview.local_host.trim().is_empty() {
            return Err(ConfigError::Message("preview.local_host must not be empty".into()));
        }
        Ok(())
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl PreviewSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            server: ServerSettings { host: "127.0.0.1".into(), port: 3000 },
            preview: PreviewSettings {
                host: "127.0.0.1".into(),
                port: 8080,
                local_host: "localhost".into(),
                default_site: "default".into(),
                sites_root: "data/sites".into(),
                hsts: false,
            },
            publisher: PublisherSettings {
                work_root: "data/work".into(),
                git_binary: "git".into(),
                command_timeout_secs: 60,
                retain_failed_clones: false,
            },
            admin: AdminSettings { token: "x".repeat(MIN_ADMIN_TOKEN_LENGTH) },
            cors: CorsSettings { allowed_origins: vec![] },
            environment: "test".into(),
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(settings().validate().is_ok());
        assert_eq!(
            settings().preview.socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn test_short_admin_token_rejected() {
        let mut s = settings();
        s.admin.token = "short".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_default_site_must_be_slug() {
        let mut s = settings();
        s.preview.default_site = "Not A Slug".into();
        assert!(s.validate().is_err());
    }
}
