//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{PreviewService, PublishService, PublishServiceImpl, SiteResolver};
use crate::config::Settings;
use crate::domain::value_objects::SiteSlug;
use crate::infrastructure::cache::{SiteLocks, SiteTreeRegistry};
use crate::infrastructure::git::GitCommandClient;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};

/// Admin API state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn PublishService>,
    pub trees: Arc<SiteTreeRegistry>,
    /// Per-site locks shared by the publisher and any materializer, so a
    /// publish never reads a tree mid-swap
    pub locks: Arc<SiteLocks>,
    /// Real git client, probed by readiness; `None` when publishing runs
    /// against another client
    pub git: Option<Arc<GitCommandClient>>,
    pub settings: Arc<Settings>,
    /// Parent of every request's cancellation token
    pub shutdown: CancellationToken,
}

/// Preview server state
#[derive(Clone)]
pub struct PreviewState {
    pub preview: Arc<PreviewService>,
    pub hsts: bool,
}

impl PreviewState {
    pub fn new(settings: &Settings, trees: Arc<SiteTreeRegistry>) -> Result<Self> {
        let default_site = SiteSlug::parse(&settings.preview.default_site)
            .context("preview.default_site is not a valid slug")?;
        let resolver = SiteResolver::new(&settings.preview.local_host, default_site);
        Ok(Self {
            preview: Arc::new(PreviewService::new(resolver, trees)),
            hsts: settings.preview.hsts,
        })
    }
}

/// Both routers with their middleware stacks applied
pub fn build_routers(state: AppState, preview: PreviewState) -> (Router, Router) {
    let admin = routes::create_admin_router(state.clone())
        .layer(logging::create_trace_layer())
        .layer(cors::create_cors_layer(&state.settings.cors));
    let preview = routes::create_preview_router(preview).layer(logging::create_trace_layer());
    (admin, preview)
}

/// Application instance
pub struct Application {
    admin_listener: TcpListener,
    preview_listener: TcpListener,
    admin: Router,
    preview: Router,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        tokio::fs::create_dir_all(&settings.preview.sites_root)
            .await
            .with_context(|| format!("creating {}", settings.preview.sites_root.display()))?;
        tokio::fs::create_dir_all(&settings.publisher.work_root)
            .await
            .with_context(|| format!("creating {}", settings.publisher.work_root.display()))?;

        let trees = Arc::new(SiteTreeRegistry::new(&settings.preview.sites_root));
        let git = Arc::new(GitCommandClient::from_settings(&settings.publisher));
        match git.version().await {
            Ok(version) => tracing::info!(%version, "Found git"),
            Err(e) => tracing::warn!(error = %e, "git is not runnable; publishing will fail"),
        }

        let locks = Arc::new(SiteLocks::new());
        let publisher = PublishServiceImpl::new(
            git.clone(),
            locks.clone(),
            &settings.publisher.work_root,
        )
        .retain_failed_clones(settings.publisher.retain_failed_clones);

        let shutdown = CancellationToken::new();
        let preview_state = PreviewState::new(&settings, trees.clone())?;
        let state = AppState {
            publisher: Arc::new(publisher),
            trees,
            locks,
            git: Some(git),
            settings: Arc::new(settings.clone()),
            shutdown: shutdown.clone(),
        };
        let (admin, preview) = build_routers(state, preview_state);

        let admin_addr = settings.server.socket_addr()?;
        let admin_listener = TcpListener::bind(admin_addr)
            .await
            .with_context(|| format!("binding admin listener on {}", admin_addr))?;
        tracing::info!("Admin API listening on {}", admin_addr);

        let preview_addr = settings.preview.socket_addr()?;
        let preview_listener = TcpListener::bind(preview_addr)
            .await
            .with_context(|| format!("binding preview listener on {}", preview_addr))?;
        tracing::info!("Preview listening on {}", preview_addr);

        Ok(Self {
            admin_listener,
            preview_listener,
            admin,
            preview,
            shutdown,
        })
    }

    /// Run both servers until Ctrl-C, then drain in-flight requests
    pub async fn run_until_stopped(self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        });

        let admin = axum::serve(self.admin_listener, self.admin)
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned());
        let preview = axum::serve(self.preview_listener, self.preview)
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned());
        tokio::try_join!(
            async { admin.await.context("admin server") },
            async { preview.await.context("preview server") },
        )?;

        tracing::info!("Servers stopped");
        Ok(())
    }

    /// Stop both servers from another task
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get the bound admin address
    pub fn admin_addr(&self) -> std::io::Result<SocketAddr> {
        self.admin_listener.local_addr()
    }

    /// Get the bound preview address
    pub fn preview_addr(&self) -> std::io::Result<SocketAddr> {
        self.preview_listener.local_addr()
    }
}
