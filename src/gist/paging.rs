//! Pager metadata and order validation

use serde::Serialize;

use crate::core::error::{GistResult, QueryError};
use crate::core::query::OrderClause;
use crate::filter::resolve_path;
use crate::schema::{SchemaRegistry, TypeSchema};

/// Paging metadata of a listing
///
/// `total`, `pageCount` and the page links are only known when the total
/// was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    pub page: usize,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

impl Pager {
    /// Build the pager of `page` for a request to `uri` (path and query)
    pub fn new(page: usize, page_size: usize, total: Option<usize>, uri: &str) -> Self {
        let page_size = page_size.max(1);
        let page_count = total.map(|total| total.div_ceil(page_size));
        // The page just past the end still links back to the last page
        let prev_page = page_count
            .filter(|count| page > 1 && page <= count + 1)
            .map(|_| page_link(uri, page - 1));
        let next_page = page_count
            .filter(|count| page < *count)
            .map(|_| page_link(uri, page + 1));
        Self {
            page,
            page_size,
            total,
            page_count,
            prev_page,
            next_page,
        }
    }
}

/// `uri` with its `page` parameter set to `page`
pub fn page_link(uri: &str, page: usize) -> String {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, query),
        None => (uri, ""),
    };
    let mut replaced = false;
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let name = pair.split_once('=').map_or(pair, |(name, _)| name);
            if name == "page" {
                replaced = true;
                format!("page={}", page)
            } else {
                pair.to_string()
            }
        })
        .collect();
    if !replaced {
        pairs.push(format!("page={}", page));
    }
    format!("{}?{}", path, pairs.join("&"))
}

/// Check order clauses against the listed type, defaulting to `id`
///
/// Unknown properties are reported like unknown fields; collections cannot
/// be ordered by.
pub fn validate_orders(
    registry: &SchemaRegistry,
    schema: &TypeSchema,
    orders: &[OrderClause],
) -> GistResult<Vec<OrderClause>> {
    for order in orders {
        let path: Vec<String> = order.property.split('.').map(str::to_string).collect();
        let property = resolve_path(registry, schema, &path)?;
        if property.kind.is_collection() {
            return Err(QueryError::UnorderableProperty {
                property: order.property.clone(),
            }
            .into());
        }
    }
    if orders.is_empty() {
        return Ok(vec![OrderClause::asc("id")]);
    }
    Ok(orders.to_vec())
}
