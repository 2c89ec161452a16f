//! Server host for transport-agnostic API exposure
//!
//! The host owns everything a request needs: configuration, the schema
//! registry, the gist service and the collaborators it was built from. It
//! knows nothing about HTTP; exposures turn it into a router.

use crate::config::GistConfig;
use crate::core::auth::IdentityProvider;
use crate::core::service::ObjectStore;
use crate::gist::GistService;
use crate::integrity::CheckResultStore;
use crate::schema::SchemaRegistry;
use std::sync::Arc;

/// Host context containing all server state
pub struct GistHost {
    /// Configuration the host was built from
    pub config: Arc<GistConfig>,

    /// Declared types
    pub registry: Arc<SchemaRegistry>,

    /// Query engine
    pub service: GistService,

    /// Resolves callers from request headers
    pub identity: Arc<dyn IdentityProvider>,

    /// Results of data integrity checks, private to this host
    pub check_results: Arc<dyn CheckResultStore>,
}

impl GistHost {
    pub fn new(
        config: GistConfig,
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        check_results: Arc<dyn CheckResultStore>,
    ) -> Self {
        let service = GistService::new(registry.clone(), store, identity.clone(), &config);
        Self {
            config: Arc::new(config),
            registry,
            service,
            identity,
            check_results,
        }
    }

    /// Collection names served by the host
    pub fn collections(&self) -> Vec<&str> {
        self.registry
            .types()
            .filter(|schema| !schema.embedded)
            .map(|schema| schema.plural.as_str())
            .collect()
    }
}
