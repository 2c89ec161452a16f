//! In-memory collaborators for testing and development

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::http::HeaderMap;
use indexmap::IndexMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::auth::{Caller, IdentityProvider};
use crate::core::object::GistObject;
use crate::core::query::Direction;
use crate::core::service::{ObjectStore, StoreQuery};
use crate::filter::{ObjectLookup, matches_all};
use crate::schema::SchemaRegistry;

type Objects = HashMap<String, IndexMap<String, GistObject>>;

/// In-memory object store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// Filters, ordering and sharing visibility are evaluated against the
/// registry the store was created with.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    registry: Arc<SchemaRegistry>,
    objects: Arc<RwLock<Objects>>,
}

struct Snapshot<'a>(&'a Objects);

impl ObjectLookup for Snapshot<'_> {
    fn lookup(&self, type_name: &str, id: &str) -> Option<&GistObject> {
        self.0.get(type_name).and_then(|objects| objects.get(id))
    }
}

impl InMemoryObjectStore {
    /// Create an empty store
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace an object
    pub fn insert(&self, object: GistObject) -> Result<()> {
        if self.registry.get(&object.type_name).is_none() {
            return Err(anyhow!("Unknown type: {}", object.type_name));
        }
        let mut objects = self
            .objects
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        objects
            .entry(object.type_name.clone())
            .or_default()
            .insert(object.id.clone(), object);
        Ok(())
    }

    /// Remove an object, returning whether it existed
    pub fn remove(&self, type_name: &str, id: &str) -> Result<bool> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(objects
            .get_mut(type_name)
            .and_then(|of_type| of_type.shift_remove(id))
            .is_some())
    }

    /// Objects matching the query's filters and visibility, ordered
    fn select(&self, objects: &Objects, query: &StoreQuery) -> Vec<GistObject> {
        let Some(schema) = self.registry.get(&query.type_name) else {
            return Vec::new();
        };
        let lookup = Snapshot(objects);
        let mut selected: Vec<&GistObject> = objects
            .get(&query.type_name)
            .map(|of_type| of_type.values().collect())
            .unwrap_or_default();

        if let Some(within) = &query.within {
            selected.retain(|o| within.contains(&o.id));
        }
        selected.retain(|o| {
            !schema.shareable
                || o.sharing
                    .as_ref()
                    .is_none_or(|sharing| sharing.can_read(&query.reader))
        });
        selected.retain(|o| {
            matches_all(&query.filters, query.junction, o, &self.registry, &lookup)
        });

        selected.sort_by(|a, b| {
            for order in &query.orders {
                let left = sort_value(a, &order.property, &self.registry, &lookup);
                let right = sort_value(b, &order.property, &self.registry, &lookup);
                // Missing values sort last whatever the direction
                let ordering = match (left, right) {
                    (Some(l), Some(r)) => match order.direction {
                        Direction::Asc => compare_values(&l, &r),
                        Direction::Desc => compare_values(&l, &r).reverse(),
                    },
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.id.cmp(&b.id)
        });

        selected.into_iter().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, type_name: &str, id: &str) -> Result<Option<GistObject>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(Snapshot(&objects).lookup(type_name, id).cloned())
    }

    async fn fetch_many(&self, type_name: &str, ids: &[String]) -> Result<Vec<GistObject>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let snapshot = Snapshot(&objects);
        Ok(ids
            .iter()
            .filter_map(|id| snapshot.lookup(type_name, id).cloned())
            .collect())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<GistObject>> {
        let objects = self
            .objects
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let selected = self.select(&objects, query);
        Ok(match query.window {
            Some(window) => selected
                .into_iter()
                .skip(window.offset)
                .take(window.limit)
                .collect(),
            None => selected,
        })
    }

    async fn count(&self, query: &StoreQuery) -> Result<usize> {
        let objects = self
            .objects
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(self.select(&objects, query).len())
    }
}

/// Value of a dotted order path, following references
fn sort_value(
    object: &GistObject,
    path: &str,
    registry: &SchemaRegistry,
    lookup: &dyn ObjectLookup,
) -> Option<Value> {
    let mut current = object;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segment == "id" {
            return Some(Value::String(current.id.clone()));
        }
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value.clone());
        }
        let schema = registry.get(&current.type_name)?;
        let target = schema.get(segment)?.kind.target_type()?;
        match value {
            Value::String(id) => current = lookup.lookup(target, id)?,
            // Embedded objects are plain JSON below this point
            Value::Object(map) => {
                let rest: Vec<&str> = segments.collect();
                return lookup_embedded(map, &rest);
            }
            _ => return None,
        }
    }
    None
}

fn lookup_embedded(map: &serde_json::Map<String, Value>, path: &[&str]) -> Option<Value> {
    let (last, init) = path.split_last()?;
    let mut current = map;
    for key in init {
        current = current.get(*key)?.as_object()?;
    }
    current.get(*last).cloned()
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (l, r) => l.to_string().cmp(&r.to_string()),
    }
}

/// Identity provider backed by a map of known users
///
/// The caller is taken from a request header holding the user id; requests
/// without it, or naming an unknown user, are anonymous.
#[derive(Clone)]
pub struct InMemoryIdentityProvider {
    header: String,
    users: Arc<RwLock<HashMap<String, Caller>>>,
}

impl InMemoryIdentityProvider {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a user; callers without an id are rejected
    pub fn add_user(&self, user: Caller) -> Result<()> {
        let id = user
            .id
            .clone()
            .ok_or_else(|| anyhow!("Cannot register an anonymous user"))?;
        let mut users = self
            .users
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        users.insert(id, user);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_caller(&self, headers: &HeaderMap) -> Result<Caller> {
        let Some(id) = headers.get(&self.header).and_then(|v| v.to_str().ok()) else {
            return Ok(Caller::anonymous());
        };
        Ok(self.find_user(id).await?.unwrap_or_else(Caller::anonymous))
    }

    async fn find_user(&self, id: &str) -> Result<Option<Caller>> {
        let users = self
            .users
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(users.get(id).cloned())
    }
}
