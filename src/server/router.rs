//! Router builder for gist routes

use super::handlers::{
    integrity_completed, integrity_summary, list_filtered, list_gist, object_filtered,
    object_gist, property_gist,
};
use super::host::GistHost;
use axum::{Router, routing::get};
use std::sync::Arc;

/// Build the query routes
///
/// These routes are generic and work for every declared collection:
/// - GET /{collection}/gist - List with gist semantics
/// - GET /{collection} - List with field-filter semantics
/// - GET /{collection}/{id}/gist - One object
/// - GET /{collection}/{id} - One object with field-filter semantics
/// - GET /{collection}/{id}/{property}/gist - Property of one object
pub fn build_gist_routes(host: Arc<GistHost>) -> Router {
    Router::new()
        .route("/{collection}", get(list_filtered))
        .route("/{collection}/gist", get(list_gist))
        .route("/{collection}/{id}", get(object_filtered))
        .route("/{collection}/{id}/gist", get(object_gist))
        .route("/{collection}/{id}/{property}/gist", get(property_gist))
        .with_state(host)
}

/// Build the data integrity routes
///
/// Static segments take precedence over `{collection}`, so these coexist
/// with the gist routes.
pub fn build_integrity_routes(host: Arc<GistHost>) -> Router {
    Router::new()
        .route("/dataIntegrity/summary", get(integrity_summary))
        .route("/dataIntegrity/summary/completed", get(integrity_completed))
        .with_state(host)
}
