//! Prefetching of the objects a projection reaches
//!
//! Projection itself is synchronous. Before it runs, every object behind an
//! expanded reference, an expanded collection or a pluck is fetched here,
//! one round trip per plan level and type.

use indexmap::IndexSet;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::resolver::{Plan, Shape};
use crate::core::error::GistResult;
use crate::core::object::{GistObject, collection_ids};
use crate::core::service::ObjectStore;
use crate::fields::Transform;
use crate::filter::ObjectLookup;
use crate::schema::PropertyKind;

/// Objects fetched for one projection, keyed by type and id
#[derive(Debug, Default)]
pub struct ObjectGraph {
    objects: HashMap<(String, String), GistObject>,
}

impl ObjectGraph {
    pub fn insert(&mut self, object: GistObject) {
        self.objects
            .insert((object.type_name.clone(), object.id.clone()), object);
    }

    pub fn get(&self, type_name: &str, id: &str) -> Option<&GistObject> {
        self.objects.get(&(type_name.to_string(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Fetch everything `plan` needs to render `roots`
    pub async fn load(
        store: &dyn ObjectStore,
        plan: &Plan,
        roots: &[GistObject],
    ) -> GistResult<Self> {
        let mut graph = Self::default();
        let mut pending: Vec<(&Plan, Vec<Map<String, Value>>)> =
            vec![(plan, roots.iter().map(|o| o.values.clone()).collect())];

        while let Some((plan, rows)) = pending.pop() {
            for field in &plan.fields {
                let name = field.property.name.as_str();
                match (&field.property.kind, &field.shape) {
                    (PropertyKind::Embedded(_), Shape::Nested(nested)) => {
                        let inner = rows
                            .iter()
                            .filter_map(|row| row.get(name).and_then(Value::as_object))
                            .cloned()
                            .collect();
                        pending.push((nested, inner));
                    }
                    (PropertyKind::Reference(target), Shape::Nested(nested)) => {
                        let ids: IndexSet<&str> = rows
                            .iter()
                            .filter_map(|row| row.get(name).and_then(Value::as_str))
                            .collect();
                        let fetched = graph.fetch(store, target, ids).await?;
                        pending.push((nested, fetched));
                    }
                    (PropertyKind::Collection(target), Shape::Nested(nested)) => {
                        let ids: IndexSet<&str> = rows
                            .iter()
                            .flat_map(|row| collection_ids(row.get(name)))
                            .collect();
                        let fetched = graph.fetch(store, target, ids).await?;
                        pending.push((nested, fetched));
                    }
                    (PropertyKind::Collection(target), Shape::Transformed(Transform::Pluck(args)))
                        if !args.is_empty() =>
                    {
                        let ids: IndexSet<&str> = rows
                            .iter()
                            .flat_map(|row| collection_ids(row.get(name)))
                            .collect();
                        graph.fetch(store, target, ids).await?;
                    }
                    _ => {}
                }
            }
        }

        tracing::debug!(objects = graph.len(), "object graph loaded");
        Ok(graph)
    }

    /// Fetch the ids not yet loaded; returns the values of all requested objects
    async fn fetch(
        &mut self,
        store: &dyn ObjectStore,
        type_name: &str,
        ids: IndexSet<&str>,
    ) -> GistResult<Vec<Map<String, Value>>> {
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| self.get(type_name, id).is_none())
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            for object in store.fetch_many(type_name, &missing).await? {
                self.insert(object);
            }
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.get(type_name, id))
            .map(|o| o.values.clone())
            .collect())
    }
}

impl ObjectLookup for ObjectGraph {
    fn lookup(&self, type_name: &str, id: &str) -> Option<&GistObject> {
        self.get(type_name, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Caller;
    use crate::core::service::StoreQuery;
    use crate::fields::parse_fields;
    use crate::gist::resolver::{ResolveOptions, resolve};
    use crate::schema::{PropertyDescriptor, SchemaRegistry, TypeSchema};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Store recording every `fetch_many` call
    #[derive(Default)]
    struct RecordingStore {
        objects: Vec<GistObject>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn fetch(&self, type_name: &str, id: &str) -> Result<Option<GistObject>> {
            Ok(self
                .objects
                .iter()
                .find(|o| o.type_name == type_name && o.id == id)
                .cloned())
        }

        async fn fetch_many(&self, type_name: &str, ids: &[String]) -> Result<Vec<GistObject>> {
            self.calls
                .lock()
                .unwrap()
                .push((type_name.to_string(), ids.to_vec()));
            Ok(self
                .objects
                .iter()
                .filter(|o| o.type_name == type_name && ids.contains(&o.id))
                .cloned()
                .collect())
        }

        async fn query(&self, _query: &StoreQuery) -> Result<Vec<GistObject>> {
            Ok(Vec::new())
        }

        async fn count(&self, _query: &StoreQuery) -> Result<usize> {
            Ok(0)
        }
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(
                TypeSchema::new("user")
                    .property(PropertyDescriptor::text("surname"))
                    .property(PropertyDescriptor::reference("createdBy", "user")),
            )
            .register(
                TypeSchema::new("userGroup")
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::collection("users", "user")),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_expanded_levels() {
        let registry = registry();
        let store = RecordingStore {
            objects: vec![
                GistObject::new("user", "u1").with_reference("createdBy", "u3"),
                GistObject::new("user", "u2").with_reference("createdBy", "u3"),
                GistObject::new("user", "u3").with_value("surname", "Root"),
            ],
            ..RecordingStore::default()
        };
        let group = GistObject::new("userGroup", "g1").with_collection("users", ["u1", "u2"]);

        let fields = parse_fields("users[surname,createdBy[surname]]").unwrap();
        let plan = resolve(
            &registry,
            registry.get("userGroup").unwrap(),
            &fields,
            &Caller::superuser("s", "admin"),
            &ResolveOptions::default(),
        )
        .unwrap();

        let graph = ObjectGraph::load(&store, &plan, &[group]).await.unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.lookup("user", "u3").is_some());

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec!["u1", "u2"]);
        assert_eq!(calls[1].1, vec!["u3"]);
    }

    #[tokio::test]
    async fn test_transforms_without_elements_fetch_nothing() {
        let registry = registry();
        let store = RecordingStore::default();
        let group = GistObject::new("userGroup", "g1").with_collection("users", ["u1"]);

        let plan = resolve(
            &registry,
            registry.get("userGroup").unwrap(),
            &parse_fields("users::size").unwrap(),
            &Caller::superuser("s", "admin"),
            &ResolveOptions::default(),
        )
        .unwrap();

        let graph = ObjectGraph::load(&store, &plan, &[group]).await.unwrap();
        assert!(graph.is_empty());
        assert!(store.calls.lock().unwrap().is_empty());
    }
}
