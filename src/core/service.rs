//! Collaborator traits
//!
//! The engine never reads objects itself; it asks an [`ObjectStore`]. Stores
//! evaluate filters, ordering, windowing and sharing visibility, so an
//! implementation backed by a database can push all of it down.

use anyhow::Result;
use async_trait::async_trait;

use super::auth::Caller;
use super::object::GistObject;
use super::query::{Junction, OrderClause};
use crate::filter::FilterClause;

/// Offset and limit of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    /// Window of a 1-based page
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// A listing request handed to a store
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub type_name: String,
    pub filters: Vec<FilterClause>,
    pub junction: Junction,
    /// Applied in order; ties are always broken by ascending id
    pub orders: Vec<OrderClause>,
    pub window: Option<PageWindow>,
    /// Restrict the listing to these ids (members of an owner's collection)
    pub within: Option<Vec<String>>,
    /// Only objects this caller can read are listed and counted
    pub reader: Caller,
}

impl StoreQuery {
    pub fn new(type_name: impl Into<String>, reader: Caller) -> Self {
        Self {
            type_name: type_name.into(),
            filters: Vec::new(),
            junction: Junction::And,
            orders: Vec::new(),
            window: None,
            within: None,
            reader,
        }
    }
}

/// Read access to stored objects
///
/// Implementations provide lookups and filtered listings for every type of
/// the schema registry they were built with.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object by type and id, regardless of sharing
    async fn fetch(&self, type_name: &str, id: &str) -> Result<Option<GistObject>>;

    /// Get several objects of one type; unknown ids are skipped
    async fn fetch_many(&self, type_name: &str, ids: &[String]) -> Result<Vec<GistObject>>;

    /// List the objects matching a query
    async fn query(&self, query: &StoreQuery) -> Result<Vec<GistObject>>;

    /// Count the objects matching a query, ignoring its window
    async fn count(&self, query: &StoreQuery) -> Result<usize>;
}
