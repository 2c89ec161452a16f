//! GistServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::GistHost;
use crate::config::GistConfig;
use crate::core::auth::IdentityProvider;
use crate::core::service::ObjectStore;
use crate::integrity::{CheckResultStore, InMemoryCheckResultStore};
use crate::storage::{InMemoryIdentityProvider, InMemoryObjectStore};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for gist servers
///
/// Only the configuration is required. Without a store the server lists
/// an empty in-memory store; without an identity provider every caller
/// is resolved from the configured identity header against an empty user
/// directory, i.e. anonymous.
///
/// # Example
///
/// ```ignore
/// let app = GistServerBuilder::new()
///     .with_config(GistConfig::from_yaml_file("gist.yaml")?)
///     .with_store(store)
///     .with_identity(identity)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GistServerBuilder {
    configs: Vec<GistConfig>,
    store: Option<Arc<dyn ObjectStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    check_results: Option<Arc<dyn CheckResultStore>>,
    custom_routes: Vec<Router>,
}

impl GistServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration
    ///
    /// Several configurations are merged in the order they were added.
    pub fn with_config(mut self, config: GistConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Set the object store
    pub fn with_store(mut self, store: impl ObjectStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an object store that is shared with other owners
    pub fn with_shared_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the identity provider
    pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    /// Set the integrity check result store
    pub fn with_check_results(mut self, check_results: impl CheckResultStore + 'static) -> Self {
        self.check_results = Some(Arc::new(check_results));
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<GistHost> {
        let config = self
            .configs
            .into_iter()
            .reduce(GistConfig::merge)
            .ok_or_else(|| anyhow::anyhow!("GistConfig is required. Call .with_config()"))?;

        let registry = Arc::new(config.build_registry()?);
        tracing::info!(types = registry.len(), "schema registry built");

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryObjectStore::new(registry.clone())));
        let identity = self.identity.unwrap_or_else(|| {
            Arc::new(InMemoryIdentityProvider::new(
                config.server.identity_header.clone(),
            ))
        });
        let check_results = self
            .check_results
            .unwrap_or_else(|| Arc::new(InMemoryCheckResultStore::new()));

        Ok(GistHost::new(config, registry, store, identity, check_results))
    }

    /// Build the REST router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        Ok(RestExposure::build_router(host, custom_routes))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to the configured address, or `addr` when given.
    pub async fn serve(mut self, addr: Option<&str>) -> Result<()> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        let addr = addr
            .map(str::to_string)
            .unwrap_or_else(|| host.config.server.bind.clone());

        let app = RestExposure::build_router(host, custom_routes);
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
