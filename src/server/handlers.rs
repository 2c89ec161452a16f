//! HTTP handlers for gist queries
//!
//! Handlers only translate HTTP into a [`GistRequest`]; everything else is
//! up to the [`GistService`](crate::gist::GistService).

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::HeaderMap,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use super::host::GistHost;
use crate::core::error::GistResult;
use crate::core::query::GistParams;
use crate::gist::{GistRequest, Mode};
use crate::integrity::CheckSummary;

type Pairs = Query<Vec<(String, String)>>;

async fn request(
    host: &GistHost,
    headers: &HeaderMap,
    pairs: &[(String, String)],
    uri: &axum::http::Uri,
    mode: Mode,
) -> GistResult<GistRequest> {
    let params = GistParams::from_pairs(pairs)?;
    let caller = host.identity.current_caller(headers).await?;
    let uri = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    Ok(GistRequest::new(caller, params, mode, uri))
}

/// GET /{collection}/gist
pub async fn list_gist(
    State(host): State<Arc<GistHost>>,
    Path(collection): Path<String>,
    Query(pairs): Pairs,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> GistResult<Json<Value>> {
    let request = request(&host, &headers, &pairs, &uri, Mode::Gist).await?;
    Ok(Json(host.service.list(&collection, &request).await?))
}

/// GET /{collection}
pub async fn list_filtered(
    State(host): State<Arc<GistHost>>,
    Path(collection): Path<String>,
    Query(pairs): Pairs,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> GistResult<Json<Value>> {
    let request = request(&host, &headers, &pairs, &uri, Mode::FieldFilter).await?;
    Ok(Json(host.service.list(&collection, &request).await?))
}

/// GET /{collection}/{id}/gist
pub async fn object_gist(
    State(host): State<Arc<GistHost>>,
    Path((collection, id)): Path<(String, String)>,
    Query(pairs): Pairs,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> GistResult<Json<Value>> {
    let request = request(&host, &headers, &pairs, &uri, Mode::Gist).await?;
    Ok(Json(host.service.object(&collection, &id, &request).await?))
}

/// GET /{collection}/{id}
pub async fn object_filtered(
    State(host): State<Arc<GistHost>>,
    Path((collection, id)): Path<(String, String)>,
    Query(pairs): Pairs,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> GistResult<Json<Value>> {
    let request = request(&host, &headers, &pairs, &uri, Mode::FieldFilter).await?;
    Ok(Json(host.service.object(&collection, &id, &request).await?))
}

/// GET /{collection}/{id}/{property}/gist
pub async fn property_gist(
    State(host): State<Arc<GistHost>>,
    Path((collection, id, property)): Path<(String, String, String)>,
    Query(pairs): Pairs,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> GistResult<Json<Value>> {
    let request = request(&host, &headers, &pairs, &uri, Mode::Gist).await?;
    Ok(Json(
        host.service
            .property(&collection, &id, &property, &request)
            .await?,
    ))
}

/// GET /dataIntegrity/summary
///
/// `checks` restricts the result to a comma separated list of check names.
pub async fn integrity_summary(
    State(host): State<Arc<GistHost>>,
    Query(pairs): Pairs,
) -> GistResult<Json<IndexMap<String, CheckSummary>>> {
    let names: Vec<String> = pairs
        .iter()
        .filter(|(key, _)| key == "checks")
        .flat_map(|(_, value)| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    let summaries = host.check_results.summaries(&names).await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|summary| (summary.name.clone(), summary))
            .collect(),
    ))
}

/// GET /dataIntegrity/summary/completed
pub async fn integrity_completed(State(host): State<Arc<GistHost>>) -> GistResult<Json<Vec<String>>> {
    Ok(Json(host.check_results.completed().await?))
}
