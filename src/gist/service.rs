//! Request orchestration
//!
//! Every request follows the same order: parse and resolve the field
//! selection, compile filters and orders, then read from the store, prefetch
//! the object graph and project. Nothing is read before the request is known
//! to be valid.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::access::{field_decision, require_readable};
use super::graph::ObjectGraph;
use super::paging::{Pager, validate_orders};
use super::projection::{ProjectionOptions, Projector};
use super::resolver::{Mode, Plan, ResolveOptions, resolve};
use crate::config::{GistConfig, PagingConfig, ProjectionConfig};
use crate::core::auth::{Caller, IdentityProvider};
use crate::core::error::{AccessError, EntityError, GistResult, SchemaError};
use crate::core::object::GistObject;
use crate::core::query::GistParams;
use crate::core::service::{ObjectStore, PageWindow, StoreQuery};
use crate::fields::{Fields, parse_fields};
use crate::filter::compile_filters;
use crate::schema::{PropertyKind, SchemaRegistry, TypeSchema};

/// One incoming query
#[derive(Debug, Clone)]
pub struct GistRequest {
    pub caller: Caller,
    pub params: GistParams,
    pub mode: Mode,
    /// Path and query as received, used for pager links
    pub uri: String,
}

impl GistRequest {
    pub fn new(caller: Caller, params: GistParams, mode: Mode, uri: impl Into<String>) -> Self {
        Self {
            caller,
            params,
            mode,
            uri: uri.into(),
        }
    }
}

/// The gist query engine
#[derive(Clone)]
pub struct GistService {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn ObjectStore>,
    identity: Arc<dyn IdentityProvider>,
    paging: PagingConfig,
    projection: ProjectionConfig,
    base_url: String,
}

impl GistService {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn ObjectStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &GistConfig,
    ) -> Self {
        Self {
            registry,
            store,
            identity,
            paging: config.paging,
            projection: config.projection,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// List the objects of a collection
    pub async fn list(&self, collection: &str, request: &GistRequest) -> GistResult<Value> {
        let schema = self.collection(collection)?;
        let fields = self.fields(request)?;
        let plan = self.plan(schema, &fields, request)?;
        let query = self.store_query(schema, request).await?;

        tracing::debug!(collection = %collection, filters = query.filters.len(), "gist list");
        let list_name = request
            .params
            .page_list_name
            .clone()
            .unwrap_or_else(|| schema.plural.clone());
        self.page(&plan, &fields, query, request, &list_name).await
    }

    /// Render a single object
    pub async fn object(&self, collection: &str, id: &str, request: &GistRequest) -> GistResult<Value> {
        let schema = self.collection(collection)?;
        let fields = self.fields(request)?;
        let plan = self.plan(schema, &fields, request)?;

        let object = self.owner(schema, id, &request.caller).await?;
        let graph = ObjectGraph::load(self.store.as_ref(), &plan, std::slice::from_ref(&object)).await?;
        let options = self.projection_options(request);
        let projector = Projector::new(&self.registry, &graph, &request.caller, &options);
        Ok(projector.item(&plan, &object, self.flattens(&fields, request)))
    }

    /// Render one property of an object
    ///
    /// Collections are listed like a collection endpoint, restricted to the
    /// members of the owner; anything else is returned as its bare value.
    pub async fn property(
        &self,
        collection: &str,
        id: &str,
        property: &str,
        request: &GistRequest,
    ) -> GistResult<Value> {
        let schema = self.collection(collection)?;
        let descriptor = schema.get(property).ok_or_else(|| SchemaError::UnknownProperty {
            property: property.to_string(),
            type_name: schema.name.clone(),
        })?;
        if !field_decision(&request.caller, schema, descriptor).is_readable() {
            return Err(AccessError::FieldNotReadable {
                field: property.to_string(),
                type_display: schema.display.clone(),
            }
            .into());
        }

        if let PropertyKind::Collection(element) = &descriptor.kind {
            let element_schema = self.registry.get(element).ok_or_else(|| {
                EntityError::UnknownCollection {
                    collection: element.clone(),
                }
            })?;
            let fields = self.fields(request)?;
            let plan = self.plan(element_schema, &fields, request)?;
            let mut query = self.store_query(element_schema, request).await?;

            let owner = self.owner(schema, id, &request.caller).await?;
            query.within = Some(owner.collection(property).into_iter().map(str::to_string).collect());
            let list_name = request
                .params
                .page_list_name
                .clone()
                .unwrap_or_else(|| property.to_string());
            return self.page(&plan, &fields, query, request, &list_name).await;
        }

        let selector = match (&descriptor.kind, request.params.fields.as_deref()) {
            (PropertyKind::Reference(_) | PropertyKind::Embedded(_), Some(inner)) => {
                format!("{}[{}]", property, inner)
            }
            _ => property.to_string(),
        };
        let fields = parse_fields(&selector)?;
        let plan = self.plan(schema, &fields, request)?;

        let owner = self.owner(schema, id, &request.caller).await?;
        let graph = ObjectGraph::load(self.store.as_ref(), &plan, std::slice::from_ref(&owner)).await?;
        let options = self.projection_options(request);
        let projector = Projector::new(&self.registry, &graph, &request.caller, &options);
        Ok(projector.item(&plan, &owner, true))
    }

    fn collection(&self, collection: &str) -> GistResult<&Arc<TypeSchema>> {
        self.registry.collection(collection).ok_or_else(|| {
            EntityError::UnknownCollection {
                collection: collection.to_string(),
            }
            .into()
        })
    }

    fn fields(&self, request: &GistRequest) -> GistResult<Fields> {
        match request.params.fields.as_deref().map(str::trim) {
            Some(fields) if !fields.is_empty() => Ok(parse_fields(fields)?),
            _ => Ok(Fields::all()),
        }
    }

    fn plan(&self, schema: &TypeSchema, fields: &Fields, request: &GistRequest) -> GistResult<Plan> {
        let options = ResolveOptions {
            default_tier: request.params.auto.unwrap_or(self.projection.default_tier),
            max_depth: self.projection.max_depth,
            mode: request.mode,
        };
        resolve(&self.registry, schema, fields, &request.caller, &options)
    }

    /// Compile filters and orders into an unwindowed store query
    async fn store_query(&self, schema: &TypeSchema, request: &GistRequest) -> GistResult<StoreQuery> {
        let params = &request.params;
        let filters = compile_filters(
            &params.filters,
            &self.registry,
            schema,
            &request.caller,
            self.identity.as_ref(),
        )
        .await?;
        let orders = validate_orders(&self.registry, schema, &params.order)?;

        let mut query = StoreQuery::new(&schema.name, request.caller.clone());
        query.filters = filters;
        query.junction = params.root_junction;
        query.orders = orders;
        Ok(query)
    }

    /// Fetch an object the caller may see
    async fn owner(&self, schema: &TypeSchema, id: &str, caller: &Caller) -> GistResult<GistObject> {
        let object = self
            .store
            .fetch(&schema.name, id)
            .await?
            .ok_or_else(|| EntityError::NotFound {
                type_name: schema.display.clone(),
                id: id.to_string(),
            })?;
        require_readable(caller, schema, &object)?;
        Ok(object)
    }

    async fn page(
        &self,
        plan: &Plan,
        fields: &Fields,
        mut query: StoreQuery,
        request: &GistRequest,
        list_name: &str,
    ) -> GistResult<Value> {
        let params = &request.params;
        let page = params.page();
        let page_size = params.page_size(self.paging.default_page_size, self.paging.max_page_size);
        query.window = Some(PageWindow::page(page, page_size));

        let items = self.store.query(&query).await?;
        let total = if params.total {
            Some(self.store.count(&query).await?)
        } else {
            None
        };

        let graph = ObjectGraph::load(self.store.as_ref(), plan, &items).await?;
        let options = self.projection_options(request);
        let projector = Projector::new(&self.registry, &graph, &request.caller, &options);
        let flatten = self.flattens(fields, request);
        let rendered: Vec<Value> = items
            .iter()
            .map(|item| projector.item(plan, item, flatten))
            .collect();

        if params.headless {
            return Ok(Value::Array(rendered));
        }
        let pager = Pager::new(page, page_size, total, &self.link(&request.uri, params.absolute_urls));
        let mut body = Map::new();
        body.insert("pager".to_string(), serde_json::to_value(pager).map_err(anyhow::Error::from)?);
        body.insert(list_name.to_string(), Value::Array(rendered));
        Ok(Value::Object(body))
    }

    fn flattens(&self, fields: &Fields, request: &GistRequest) -> bool {
        request.mode == Mode::Gist && fields.single_field().is_some()
    }

    fn projection_options(&self, request: &GistRequest) -> ProjectionOptions {
        ProjectionOptions {
            mode: request.mode,
            references: request.params.references.unwrap_or(self.projection.references),
            link_prefix: if request.params.absolute_urls {
                self.base_url.clone()
            } else {
                String::new()
            },
        }
    }

    fn link(&self, uri: &str, absolute: bool) -> String {
        if absolute {
            format!("{}{}", self.base_url, uri)
        } else {
            uri.to_string()
        }
    }
}
