//! REST API exposure
//!
//! The REST exposure consumes a `GistHost` and produces an Axum `Router`.

use super::super::host::GistHost;
use crate::server::router::{build_gist_routes, build_integrity_routes};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - Data integrity routes
    /// - Custom routes
    /// - Gist routes
    ///
    /// every request traced through `tower-http`.
    pub fn build_router(host: Arc<GistHost>, custom_routes: Vec<Router>) -> Router {
        let mut app = Self::health_routes().merge(build_integrity_routes(host.clone()));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        tracing::debug!(collections = ?host.collections(), "gist routes registered");
        app.merge(build_gist_routes(host))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "gist-rs"
        }))
    }
}
