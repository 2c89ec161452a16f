//! Rendering of objects along a plan

use serde_json::{Map, Value, json};

use super::access::object_decision;
use super::graph::ObjectGraph;
use super::resolver::{Mode, Plan, ResolvedField, Shape};
use crate::core::auth::{AccessSummary, Caller};
use crate::core::object::{GistObject, collection_ids};
use crate::fields::Transform;
use crate::schema::{PropertyKind, PropertySource, SchemaRegistry};

/// Settings affecting rendered output but not resolution
#[derive(Debug, Clone, Default)]
pub struct ProjectionOptions {
    pub mode: Mode,
    /// Add `apiEndpoints` for transformed collections
    pub references: bool,
    /// Prefix of `apiEndpoints` links, empty for relative links
    pub link_prefix: String,
}

/// Renders objects from a prefetched [`ObjectGraph`]
pub struct Projector<'a> {
    registry: &'a SchemaRegistry,
    graph: &'a ObjectGraph,
    caller: &'a Caller,
    options: &'a ProjectionOptions,
}

/// What a plan level is rendered from
#[derive(Clone, Copy)]
enum Source<'a> {
    Object(&'a GistObject),
    /// An embedded value and the object it is stored in
    Inline(&'a Map<String, Value>, Option<&'a GistObject>),
}

impl<'a> Source<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        match self {
            Source::Object(o) => o.values.get(name),
            Source::Inline(map, _) => map.get(name),
        }
    }

    fn owner(&self) -> Option<&'a GistObject> {
        match self {
            Source::Object(o) => Some(*o),
            Source::Inline(_, owner) => *owner,
        }
    }
}

impl<'a> Projector<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        graph: &'a ObjectGraph,
        caller: &'a Caller,
        options: &'a ProjectionOptions,
    ) -> Self {
        Self {
            registry,
            graph,
            caller,
            options,
        }
    }

    /// Render an object as a JSON object
    pub fn object(&self, plan: &Plan, object: &GistObject) -> Value {
        let mut out = self.render(plan, Source::Object(object));
        if let Some(endpoints) = self.endpoints(plan, object) {
            out.insert("apiEndpoints".to_string(), Value::Object(endpoints));
        }
        Value::Object(out)
    }

    /// Render an object, flattened to its only field when `flatten` is set
    pub fn item(&self, plan: &Plan, object: &GistObject, flatten: bool) -> Value {
        match plan.single_output().filter(|_| flatten) {
            Some(name) => self
                .render(plan, Source::Object(object))
                .remove(name)
                .unwrap_or(Value::Null),
            None => self.object(plan, object),
        }
    }

    fn render(&self, plan: &Plan, source: Source<'_>) -> Map<String, Value> {
        let mut out = Map::new();
        for field in &plan.fields {
            if let Some(value) = self.field(field, source) {
                out.insert(field.output_name.clone(), value);
            }
        }
        out
    }

    fn field(&self, field: &ResolvedField, source: Source<'_>) -> Option<Value> {
        let property = &field.property;
        match property.source {
            PropertySource::DisplayName => {
                return source
                    .get("displayName")
                    .or_else(|| source.get("name"))
                    .cloned();
            }
            PropertySource::Sharing => {
                return source
                    .owner()
                    .and_then(|o| o.sharing.as_ref())
                    .and_then(|s| serde_json::to_value(s).ok());
            }
            PropertySource::Access => {
                let sharing = source.owner().and_then(|o| o.sharing.as_ref());
                return serde_json::to_value(AccessSummary::of(self.caller, sharing)).ok();
            }
            PropertySource::Stored => {}
        }
        if property.name == "id" {
            if let Source::Object(object) = source {
                return Some(Value::String(object.id.clone()));
            }
        }

        let raw = source.get(&property.name);
        match (&property.kind, &field.shape) {
            (PropertyKind::Embedded(_), Shape::Nested(plan)) => match raw? {
                Value::Object(map) => Some(Value::Object(
                    self.render(plan, Source::Inline(map, source.owner())),
                )),
                other => Some(other.clone()),
            },
            (PropertyKind::Reference(target), shape) => {
                let id = raw?.as_str()?;
                let expanded = match shape {
                    Shape::Nested(plan) => self
                        .readable(target, id)
                        .map(|o| Value::Object(self.render(plan, Source::Object(o)))),
                    _ => None,
                };
                Some(expanded.unwrap_or_else(|| json!({ "id": id })))
            }
            (PropertyKind::Collection(target), Shape::Nested(plan)) => {
                let items = collection_ids(raw)
                    .into_iter()
                    .filter_map(|id| self.readable(target, id))
                    .map(|o| Value::Object(self.render(plan, Source::Object(o))))
                    .collect();
                Some(Value::Array(items))
            }
            (PropertyKind::Collection(target), Shape::Transformed(transform)) => {
                Some(self.transform(target, collection_ids(raw), transform))
            }
            _ => raw.cloned(),
        }
    }

    fn transform(&self, target: &str, ids: Vec<&str>, transform: &Transform) -> Value {
        match transform {
            Transform::Size => json!(ids.len()),
            Transform::IsEmpty => json!(ids.is_empty()),
            Transform::IsNotEmpty => json!(!ids.is_empty()),
            Transform::Ids => json!(ids),
            Transform::IdObjects => Value::Array(ids.iter().map(|id| json!({ "id": id })).collect()),
            Transform::Member(id) => json!(ids.contains(&id.as_str())),
            Transform::NotMember(id) => json!(!ids.contains(&id.as_str())),
            Transform::Pluck(props) => match props.as_slice() {
                [] => json!(ids),
                [prop] => Value::Array(
                    ids.iter()
                        .filter_map(|id| self.readable(target, id))
                        .map(|o| pluck_value(o, prop))
                        .collect(),
                ),
                _ => Value::Array(
                    ids.iter()
                        .filter_map(|id| self.readable(target, id))
                        .map(|o| {
                            let pair: Map<String, Value> = props
                                .iter()
                                .map(|p| (p.clone(), pluck_value(o, p)))
                                .collect();
                            Value::Object(pair)
                        })
                        .collect(),
                ),
            },
            // Resolution replaces `auto` and `rename` never reaches here
            Transform::Auto(_) | Transform::Rename(_) => json!(ids),
        }
    }

    /// A fetched object the caller may see
    fn readable(&self, type_name: &str, id: &str) -> Option<&'a GistObject> {
        let object = self.graph.get(type_name, id)?;
        let schema = self.registry.get(type_name)?;
        object_decision(self.caller, schema, object)
            .is_readable()
            .then_some(object)
    }

    fn endpoints(&self, plan: &Plan, object: &GistObject) -> Option<Map<String, Value>> {
        if self.options.mode != Mode::Gist || !self.options.references {
            return None;
        }
        let schema = self.registry.get(&object.type_name)?;
        if !schema.identifiable {
            return None;
        }
        let endpoints: Map<String, Value> = plan
            .fields
            .iter()
            .filter(|f| {
                f.property.kind.is_collection() && matches!(f.shape, Shape::Transformed(_))
            })
            .map(|f| {
                let link = format!(
                    "{}/{}/{}/{}/gist",
                    self.options.link_prefix, schema.plural, object.id, f.property.name
                );
                (f.output_name.clone(), Value::String(link))
            })
            .collect();
        (!endpoints.is_empty()).then_some(endpoints)
    }
}

fn pluck_value(object: &GistObject, property: &str) -> Value {
    if property == "id" {
        return Value::String(object.id.clone());
    }
    object.get(property).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Sharing;
    use crate::fields::parse_fields;
    use crate::gist::resolver::{ResolveOptions, filter_includes, resolve};
    use crate::schema::{PropertyDescriptor, TypeSchema, ValueType};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(TypeSchema::embedded_type("third").property(PropertyDescriptor::text("value")))
            .register(
                TypeSchema::embedded_type("second")
                    .property(PropertyDescriptor::embedded("third", "third")),
            )
            .register(
                TypeSchema::new("nested").property(PropertyDescriptor::embedded("first", "second")),
            )
            .register(
                TypeSchema::new("user")
                    .shareable()
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::text("surname"))
                    .property(PropertyDescriptor::scalar("age", ValueType::Number)),
            )
            .register(
                TypeSchema::new("userGroup")
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::reference("managedBy", "user"))
                    .property(PropertyDescriptor::collection("users", "user")),
            )
            .build()
            .unwrap()
    }

    fn graph() -> ObjectGraph {
        let mut graph = ObjectGraph::default();
        graph.insert(
            GistObject::new("user", "u1")
                .with_value("name", "admin")
                .with_value("surname", "Surnameadmin")
                .with_sharing(Sharing::public().with_public("r-------")),
        );
        graph.insert(
            GistObject::new("user", "u2")
                .with_value("name", "hidden")
                .with_value("surname", "Private")
                .with_sharing(Sharing::private("u2")),
        );
        graph
    }

    fn render(type_name: &str, fields: &str, object: &GistObject, options: ProjectionOptions) -> Value {
        let registry = registry();
        let caller = Caller::user("u1", "admin");
        let plan = resolve(
            &registry,
            registry.get(type_name).unwrap(),
            &parse_fields(fields).unwrap(),
            &caller,
            &ResolveOptions::default(),
        )
        .unwrap();
        let graph = graph();
        Projector::new(&registry, &graph, &caller, &options).object(&plan, object)
    }

    fn group() -> GistObject {
        GistObject::new("userGroup", "g1")
            .with_value("name", "Admins")
            .with_reference("managedBy", "u1")
            .with_collection("users", ["u1", "u2"])
    }

    #[test]
    fn test_nested_embedded_leaf() {
        let object = GistObject::new("nested", "n1")
            .with_value("first", json!({"third": {"value": "deep"}}));
        let out = render("nested", "*", &object, ProjectionOptions::default());
        assert_eq!(out["first"]["third"]["value"], "deep");

        let out = render("nested", "first[third[!value]]", &object, ProjectionOptions::default());
        assert_eq!(out["first"]["third"], json!({}));
    }

    #[test]
    fn test_pluck_pairs() {
        let out = render(
            "userGroup",
            "users::pluck(id,surname)",
            &group(),
            ProjectionOptions::default(),
        );
        assert_eq!(out["users"], json!([{"id": "u1", "surname": "Surnameadmin"}]));
    }

    #[test]
    fn test_pluck_single_and_ids() {
        let out = render("userGroup", "users::pluck(surname)", &group(), ProjectionOptions::default());
        assert_eq!(out["users"], json!(["Surnameadmin"]));

        let out = render("userGroup", "users::pluck", &group(), ProjectionOptions::default());
        assert_eq!(out["users"], json!(["u1", "u2"]));
    }

    #[test]
    fn test_membership_and_size() {
        let out = render(
            "userGroup",
            "users::member(u2)::rename(hasU2),users~size",
            &group(),
            ProjectionOptions::default(),
        );
        assert_eq!(out, json!({"hasU2": true, "users": 2}));

        let out = render("userGroup", "users::not-member(u9)", &group(), ProjectionOptions::default());
        assert_eq!(out["users"], json!(true));
    }

    #[test]
    fn test_references() {
        let out = render("userGroup", "managedBy", &group(), ProjectionOptions::default());
        assert_eq!(out["managedBy"], json!({"id": "u1"}));

        let out = render("userGroup", "managedBy[surname]", &group(), ProjectionOptions::default());
        assert_eq!(out["managedBy"], json!({"surname": "Surnameadmin"}));
    }

    #[test]
    fn test_expanded_collection_skips_unreadable() {
        let out = render("userGroup", "users[name]", &group(), ProjectionOptions::default());
        assert_eq!(out["users"], json!([{"name": "admin"}]));
    }

    #[test]
    fn test_api_endpoints() {
        let options = ProjectionOptions {
            mode: Mode::Gist,
            references: true,
            link_prefix: "http://localhost".to_string(),
        };
        let out = render("userGroup", "name,users", &group(), options);
        assert_eq!(
            out["apiEndpoints"],
            json!({"users": "http://localhost/userGroups/g1/users/gist"})
        );
    }

    #[test]
    fn test_display_name_and_access() {
        let registry = registry();
        let caller = Caller::user("u1", "admin");
        let plan = resolve(
            &registry,
            registry.get("user").unwrap(),
            &parse_fields("displayName,access").unwrap(),
            &caller,
            &ResolveOptions::default(),
        )
        .unwrap();
        let graph = graph();
        let options = ProjectionOptions::default();
        let projector = Projector::new(&registry, &graph, &caller, &options);
        let Some(user) = graph.get("user", "u1") else {
            panic!("fixture user missing");
        };
        let out = projector.object(&plan, user);
        assert_eq!(out["displayName"], "admin");
        assert_eq!(out["access"]["read"], true);
        assert_eq!(out["access"]["write"], false);
    }

    #[test]
    fn test_single_field_flattening() {
        let registry = registry();
        let caller = Caller::user("u1", "admin");
        let plan = resolve(
            &registry,
            registry.get("userGroup").unwrap(),
            &parse_fields("name").unwrap(),
            &caller,
            &ResolveOptions::default(),
        )
        .unwrap();
        let graph = graph();
        let options = ProjectionOptions::default();
        let projector = Projector::new(&registry, &graph, &caller, &options);
        assert_eq!(projector.item(&plan, &group(), true), json!("Admins"));
        assert_eq!(projector.item(&plan, &group(), false), json!({"name": "Admins"}));
    }

    /// Dotted paths of every rendered leaf, looking through arrays of objects
    fn leaf_paths(value: &Value, prefix: &str, out: &mut Vec<String>) {
        let join = |key: &str| {
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            }
        };
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    leaf_paths(child, &join(key), out);
                }
            }
            Value::Array(items) if items.iter().any(Value::is_object) => {
                for item in items {
                    leaf_paths(item, prefix, out);
                }
            }
            _ => out.push(prefix.to_string()),
        }
    }

    fn project_unrestricted(type_name: &str, fields: &str, object: &GistObject) -> Value {
        let registry = registry();
        let caller = Caller::superuser("system", "system");
        let resolve_options = ResolveOptions {
            mode: Mode::FieldFilter,
            ..ResolveOptions::default()
        };
        let plan = resolve(
            &registry,
            registry.get(type_name).unwrap(),
            &parse_fields(fields).unwrap(),
            &caller,
            &resolve_options,
        )
        .unwrap();
        let graph = graph();
        let options = ProjectionOptions {
            mode: Mode::FieldFilter,
            ..ProjectionOptions::default()
        };
        Projector::new(&registry, &graph, &caller, &options).object(&plan, object)
    }

    fn includes(type_name: &str, fields: &str, path: &str) -> bool {
        let registry = registry();
        filter_includes(
            &registry,
            registry.get(type_name).unwrap(),
            &parse_fields(fields).unwrap(),
            path,
        )
        .unwrap()
    }

    #[test]
    fn test_filter_includes_agrees_with_projection() {
        let nested = GistObject::new("nested", "n1")
            .with_value("first", json!({"third": {"value": "deep"}}));
        let cases = [
            ("userGroup", "*", group()),
            ("userGroup", "name,managedBy,users::pluck(id,surname)", group()),
            ("userGroup", "name,managedBy[surname],users[name,surname]", group()),
            ("userGroup", "name,users::pluck(surname)", group()),
            ("nested", "*", nested),
        ];
        for (type_name, fields, object) in cases {
            let out = project_unrestricted(type_name, fields, &object);
            let mut paths = Vec::new();
            leaf_paths(&out, "", &mut paths);
            assert!(!paths.is_empty(), "nothing rendered for {}", fields);
            for path in paths {
                assert!(
                    includes(type_name, fields, &path),
                    "{} rendered by `{}` but not included",
                    path,
                    fields
                );
            }
        }
    }

    #[test]
    fn test_filter_includes_rejects_unrendered_paths() {
        assert!(!includes("userGroup", "name,users::size", "managedBy"));
        assert!(!includes("userGroup", "name,users::size", "users.id"));
        assert!(!includes("userGroup", "users::pluck(id,surname)", "users.name"));
        assert!(!includes("userGroup", "users::pluck(surname)", "users.surname"));
        assert!(!includes("userGroup", "managedBy", "managedBy.surname"));
        assert!(!includes("userGroup", "*,!users", "users"));
    }
}
