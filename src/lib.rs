//! # gist-rs
//!
//! A filter-driven object query and projection service.
//!
//! Clients list or fetch objects of declared types and say exactly what they
//! want back:
//!
//! - **Field selection**: `fields=name,users[surname],!sharing` with nested
//!   blocks, exclusions and presets (`:simple`, `:identifiable`, ...)
//! - **Transforms**: `users::size`, `users::pluck(surname)`, `name~rename(n)`
//!   and the `auto` tiers deciding how collections are summarised
//! - **Filters**: `filter=name:like:admin` with reference paths, access
//!   operators and `and`/`or` junctions
//! - **Paging**: `page`, `pageSize`, `total` and `order` with prev/next links
//! - **Visibility**: sharing-aware object access and restricted properties
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gist::prelude::*;
//!
//! let config = GistConfig::from_yaml_file("gist.yaml")?;
//! let registry = Arc::new(config.build_registry()?);
//! let store = InMemoryObjectStore::new(registry);
//! store.insert(GistObject::new("userGroup", "g1").with_value("name", "Admins"))?;
//!
//! GistServerBuilder::new()
//!     .with_config(config)
//!     .with_store(store)
//!     .serve(None)
//!     .await?;
//!
//! // GET /userGroups/gist?fields=name,users::size&total=true
//! ```

pub mod config;
pub mod core;
pub mod fields;
pub mod filter;
pub mod gist;
pub mod integrity;
pub mod schema;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AnonymousIdentityProvider, Caller, IdentityProvider, Sharing},
        error::{GistError, GistResult},
        object::GistObject,
        query::GistParams,
        service::{ObjectStore, StoreQuery},
    };

    // === Schema and fields ===
    pub use crate::fields::{Fields, Tier, Transform, parse_fields};
    pub use crate::schema::{PropertyDescriptor, SchemaRegistry, TypeSchema, ValueType};

    // === Engine ===
    pub use crate::gist::{GistRequest, GistService, Mode};

    // === Storage ===
    pub use crate::integrity::{CheckResultStore, CheckSummary, InMemoryCheckResultStore};
    pub use crate::storage::{InMemoryIdentityProvider, InMemoryObjectStore};

    // === Config ===
    pub use crate::config::GistConfig;

    // === Server ===
    pub use crate::server::{GistHost, GistServerBuilder, init_tracing};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
