//! # sitepress
//!
//! Multi-tenant static-site preview server and git publisher.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Working directories and the git client
//! - Admin API and preview HTTP servers

use anyhow::Result;
use tracing::info;

use sitepress::config::Settings;
use sitepress::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    sitepress::telemetry::init_tracing();

    info!("Starting sitepress...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        admin_port = %settings.server.port,
        preview_port = %settings.preview.port,
        sites_root = %settings.preview.sites_root.display(),
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
