//! Resolve a parsed field selection against a type into a projection plan
//!
//! Resolution checks every requested name, preset and transform against the
//! schema and the caller's field permissions. Nothing is read from the store
//! here, so an invalid request fails before any I/O.

use crate::core::auth::Caller;
use crate::core::error::{AccessError, GistError, GistResult, SchemaError};
use crate::fields::{Fields, Tier, Transform};
use crate::schema::{PropertyDescriptor, PropertyKind, PropertySource, SchemaRegistry, TypeSchema};

use super::access::field_decision;

/// Presets a level may name besides `*`/`:all`
pub const PRESETS: [&str; 4] = [":simple", ":identifiable", ":persisted", ":owner"];

/// Which endpoint family a request came through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// `/{collection}/gist`: collections default to `auto`, single fields flatten
    #[default]
    Gist,
    /// `/{collection}`: collections default to id objects
    FieldFilter,
}

/// Knobs of a resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub default_tier: Tier,
    /// Depth at which implicit expansion of embedded objects stops
    pub max_depth: usize,
    pub mode: Mode,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            default_tier: Tier::M,
            max_depth: 8,
            mode: Mode::Gist,
        }
    }
}

/// How a resolved field is rendered
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// The stored or computed value as is
    Value,
    /// An embedded, referenced or element object rendered with its own plan
    Nested(Plan),
    /// `{ "id": ... }` of a reference
    IdObject,
    /// A collection reduced by a value transform
    Transformed(Transform),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub property: PropertyDescriptor,
    /// Key in the output, differs from the property name after `rename`
    pub output_name: String,
    pub shape: Shape,
    /// Named explicitly rather than reached through `*` or a preset
    pub explicit: bool,
}

/// Ordered fields to render for one type
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub type_name: String,
    pub fields: Vec<ResolvedField>,
}

impl Plan {
    pub fn field(&self, name: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.property.name == name)
    }

    /// Whether a dotted property path appears in the rendered output
    pub fn includes(&self, path: &str) -> bool {
        let (first, rest) = match path.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (path, None),
        };
        let Some(field) = self.field(first) else {
            return false;
        };
        let Some(rest) = rest else {
            return true;
        };
        match &field.shape {
            Shape::Nested(plan) => plan.includes(rest),
            Shape::IdObject | Shape::Transformed(Transform::IdObjects) => rest == "id",
            Shape::Value => matches!(field.property.kind, PropertyKind::Embedded(_)),
            // Plucking two or more properties renders an object per element
            Shape::Transformed(Transform::Pluck(props)) if props.len() > 1 => {
                props.iter().any(|p| p == rest)
            }
            Shape::Transformed(_) => false,
        }
    }

    /// Output name of the only field, when there is exactly one
    pub fn single_output(&self) -> Option<&str> {
        match self.fields.as_slice() {
            [only] => Some(&only.output_name),
            _ => None,
        }
    }
}

/// Turn `fields` into a plan for `schema`
pub fn resolve(
    registry: &SchemaRegistry,
    schema: &TypeSchema,
    fields: &Fields,
    caller: &Caller,
    options: &ResolveOptions,
) -> GistResult<Plan> {
    Resolver {
        registry,
        caller,
        options,
    }
    .level(schema, fields, 0)
}

/// Whether `path` would appear when projecting `schema` with `fields`
///
/// Evaluated without field restrictions and without instance data.
pub fn filter_includes(
    registry: &SchemaRegistry,
    schema: &TypeSchema,
    fields: &Fields,
    path: &str,
) -> GistResult<bool> {
    let caller = Caller::superuser("system", "system");
    let options = ResolveOptions {
        mode: Mode::FieldFilter,
        ..ResolveOptions::default()
    };
    let plan = resolve(registry, schema, fields, &caller, &options)?;
    Ok(plan.includes(path))
}

struct Resolver<'a> {
    registry: &'a SchemaRegistry,
    caller: &'a Caller,
    options: &'a ResolveOptions,
}

impl Resolver<'_> {
    fn level(&self, schema: &TypeSchema, fields: &Fields, depth: usize) -> GistResult<Plan> {
        for preset in fields.presets() {
            if !PRESETS.contains(&preset) {
                return Err(SchemaError::UnknownPreset {
                    preset: preset.to_string(),
                }
                .into());
            }
        }
        for name in fields.included_names() {
            if schema.get(name).is_none() {
                return Err(unknown_property(name, schema));
            }
        }

        let mut names: Vec<&str> = if fields.is_all() || fields.is_exclusion_only() {
            schema.properties().map(|p| p.name.as_str()).collect()
        } else {
            schema
                .properties()
                .filter(|p| fields.presets().any(|preset| in_preset(p, preset)))
                .map(|p| p.name.as_str())
                .collect()
        };
        for name in fields.included_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let mut plan = Plan {
            type_name: schema.name.clone(),
            fields: Vec::new(),
        };
        for name in names {
            if fields.is_excluded(name) {
                continue;
            }
            let Some(property) = schema.get(name) else {
                continue;
            };
            let explicit = fields.is_explicit(name);
            if !field_decision(self.caller, schema, property).is_readable() {
                if explicit {
                    return Err(AccessError::FieldNotReadable {
                        field: name.to_string(),
                        type_display: schema.display.clone(),
                    }
                    .into());
                }
                tracing::debug!(field = %name, type_name = %schema.name, "restricted field dropped");
                continue;
            }
            if let Some(field) = self.field(schema, property, fields, explicit, depth)? {
                plan.fields.push(field);
            }
        }
        Ok(plan)
    }

    fn field(
        &self,
        schema: &TypeSchema,
        property: &PropertyDescriptor,
        fields: &Fields,
        explicit: bool,
        depth: usize,
    ) -> GistResult<Option<ResolvedField>> {
        let name = property.name.as_str();
        let transforms = fields.transforms(name);
        let output_name = transforms
            .iter()
            .find_map(|t| match t {
                Transform::Rename(to) => Some(to.clone()),
                _ => None,
            })
            .unwrap_or_else(|| name.to_string());
        let value_transform = transforms.iter().find(|t| !t.is_rename());
        let block = fields.children(name);

        if let Some(transform) = value_transform {
            if !property.kind.is_collection() {
                return Err(SchemaError::TransformNotApplicable {
                    field: name.to_string(),
                    transform: transform.name().to_string(),
                    message: format!("{} is not a collection", name),
                }
                .into());
            }
        }

        let shape = match (&property.kind, value_transform) {
            (PropertyKind::Collection(target), Some(transform)) => {
                let Some(concrete) = transform.concretize(self.options.default_tier) else {
                    return Ok(None);
                };
                if let Transform::Pluck(args) = &concrete {
                    self.check_pluck(target, args)?;
                }
                Shape::Transformed(concrete)
            }
            (PropertyKind::Scalar(_), _) => Shape::Value,
            (PropertyKind::Embedded(target), _) => {
                let target = self.target(target, schema)?;
                match block {
                    Some(block) => Shape::Nested(self.level(target, block, depth + 1)?),
                    None if depth < self.options.max_depth => {
                        Shape::Nested(self.level(target, &Fields::all(), depth + 1)?)
                    }
                    None => Shape::Value,
                }
            }
            (PropertyKind::Reference(target), _) => match block {
                Some(block) => {
                    let target = self.target(target, schema)?;
                    Shape::Nested(self.level(target, block, depth + 1)?)
                }
                None => Shape::IdObject,
            },
            (PropertyKind::Collection(target), None) => match block {
                Some(block) => {
                    let target = self.target(target, schema)?;
                    Shape::Nested(self.level(target, block, depth + 1)?)
                }
                None => {
                    let fallback = match self.options.mode {
                        Mode::Gist => Transform::Auto(None),
                        Mode::FieldFilter => Transform::IdObjects,
                    };
                    match fallback.concretize(self.options.default_tier) {
                        Some(concrete) => Shape::Transformed(concrete),
                        None => return Ok(None),
                    }
                }
            },
        };

        Ok(Some(ResolvedField {
            property: property.clone(),
            output_name,
            shape,
            explicit,
        }))
    }

    fn target(&self, name: &str, owner: &TypeSchema) -> GistResult<&TypeSchema> {
        self.registry
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| {
                SchemaError::InvalidDefinition {
                    type_name: owner.name.clone(),
                    message: format!("unknown type '{}'", name),
                }
                .into()
            })
    }

    /// Pluck arguments must be stored scalars of the element type
    fn check_pluck(&self, element_type: &str, args: &[String]) -> GistResult<()> {
        let Some(element) = self.registry.get(element_type) else {
            return Ok(());
        };
        for arg in args {
            let property = element
                .get(arg)
                .ok_or_else(|| unknown_property(arg, element))?;
            if !property.is_persisted_scalar() {
                let reason = if property.persisted {
                    "it is not a simple value"
                } else {
                    "it is not persisted"
                };
                return Err(SchemaError::NotPluckable {
                    property: arg.clone(),
                    type_name: element.name.clone(),
                    reason: reason.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn in_preset(property: &PropertyDescriptor, preset: &str) -> bool {
    match preset {
        ":simple" => property.is_persisted_scalar() && property.source != PropertySource::Sharing,
        ":identifiable" => {
            matches!(property.name.as_str(), "id" | "name" | "code" | "displayName")
        }
        ":persisted" => property.persisted,
        ":owner" => property.persisted && !property.kind.is_collection(),
        _ => false,
    }
}

fn unknown_property(name: &str, schema: &TypeSchema) -> GistError {
    SchemaError::UnknownProperty {
        property: name.to_string(),
        type_name: schema.name.clone(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::parse_fields;
    use crate::schema::{PropertyDescriptor, ValueType};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(TypeSchema::embedded_type("third").property(PropertyDescriptor::text("value")))
            .register(
                TypeSchema::embedded_type("second")
                    .property(PropertyDescriptor::text("label"))
                    .property(PropertyDescriptor::embedded("third", "third")),
            )
            .register(
                TypeSchema::new("nested")
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::embedded("first", "second")),
            )
            .register(
                TypeSchema::new("user")
                    .shareable()
                    .view_authority("F_USER_VIEW")
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::text("surname"))
                    .property(PropertyDescriptor::text("email").restricted())
                    .property(PropertyDescriptor::scalar("age", ValueType::Number))
                    .property(PropertyDescriptor::collection("userGroups", "userGroup")),
            )
            .register(
                TypeSchema::new("userGroup")
                    .shareable()
                    .property(PropertyDescriptor::text("name"))
                    .property(PropertyDescriptor::reference("managedBy", "user"))
                    .property(PropertyDescriptor::collection("users", "user")),
            )
            .build()
            .unwrap()
    }

    fn plan(type_name: &str, fields: &str, caller: &Caller) -> GistResult<Plan> {
        let registry = registry();
        let schema = registry.get(type_name).unwrap().clone();
        let fields = parse_fields(fields)?;
        resolve(&registry, &schema, &fields, caller, &ResolveOptions::default())
    }

    fn admin() -> Caller {
        Caller::superuser("admin", "admin")
    }

    fn names(plan: &Plan) -> Vec<&str> {
        plan.fields.iter().map(|f| f.output_name.as_str()).collect()
    }

    #[test]
    fn test_wildcard_reaches_deepest_leaf() {
        let plan = plan("nested", "*", &admin()).unwrap();
        assert!(plan.includes("first.third.value"));
        assert!(plan.includes("first.label"));
    }

    #[test]
    fn test_parent_includes_children() {
        let plan = plan("nested", "first", &admin()).unwrap();
        assert!(plan.includes("first.third.value"));
        assert!(!plan.includes("name"));
    }

    #[test]
    fn test_exclusion_beats_inclusion() {
        let plan = plan("nested", "!first,first", &admin()).unwrap();
        assert!(!plan.includes("first"));
        assert!(!plan.includes("first.label"));
    }

    #[test]
    fn test_nested_exclusion_under_wildcard() {
        let plan = plan("nested", "*,first[third[!value]]", &admin()).unwrap();
        assert!(plan.includes("first.third"));
        assert!(!plan.includes("first.third.value"));
        assert!(plan.includes("name"));
    }

    #[test]
    fn test_explicit_order_follows_request() {
        let plan = plan("user", "surname,name,id", &admin()).unwrap();
        assert_eq!(names(&plan), vec!["surname", "name", "id"]);
    }

    #[test]
    fn test_unknown_property_and_preset() {
        let err = plan("userGroup", "foo", &admin()).unwrap_err();
        assert_eq!(err.to_string(), "Property 'foo' does not exist in userGroup");
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

        let err = plan("userGroup", ":unknown", &admin()).unwrap_err();
        assert_eq!(err.to_string(), "Field not supported: ':unknown'");
    }

    #[test]
    fn test_restricted_field_explicit_and_implicit() {
        let guest = Caller::user("g1", "guest");
        let err = plan("user", "email", &guest).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field 'email' is not readable as user is not allowed to view objects of type User."
        );

        let implicit = plan("user", "*", &guest).unwrap();
        assert!(!implicit.includes("email"));
        assert!(implicit.includes("surname"));

        let viewer = Caller::user("v1", "viewer").with_authority("F_USER_VIEW");
        assert!(plan("user", "email", &viewer).unwrap().includes("email"));
    }

    #[test]
    fn test_collection_defaults() {
        let gist = plan("userGroup", "users", &admin()).unwrap();
        assert_eq!(gist.fields[0].shape, Shape::Transformed(Transform::Size));

        let registry = registry();
        let schema = registry.get("userGroup").unwrap().clone();
        let options = ResolveOptions {
            mode: Mode::FieldFilter,
            ..ResolveOptions::default()
        };
        let fields = parse_fields("users").unwrap();
        let plan = resolve(&registry, &schema, &fields, &admin(), &options).unwrap();
        assert_eq!(plan.fields[0].shape, Shape::Transformed(Transform::IdObjects));
        assert!(plan.includes("users.id"));
    }

    #[test]
    fn test_auto_tiers() {
        let plan_l = plan("userGroup", "users::auto(L)", &admin()).unwrap();
        assert_eq!(plan_l.fields[0].shape, Shape::Transformed(Transform::Ids));

        let plan_xs = plan("userGroup", "name,users::auto(XS)", &admin()).unwrap();
        assert_eq!(names(&plan_xs), vec!["name"]);
    }

    #[test]
    fn test_reference_with_and_without_block() {
        let plain = plan("userGroup", "managedBy", &admin()).unwrap();
        assert_eq!(plain.fields[0].shape, Shape::IdObject);
        assert!(plain.includes("managedBy.id"));
        assert!(!plain.includes("managedBy.surname"));

        let expanded = plan("userGroup", "managedBy[surname]", &admin()).unwrap();
        assert!(expanded.includes("managedBy.surname"));
    }

    #[test]
    fn test_rename_changes_output_name() {
        let plan = plan("userGroup", "users::size::rename(members)", &admin()).unwrap();
        assert_eq!(plan.fields[0].output_name, "members");
        assert_eq!(plan.fields[0].shape, Shape::Transformed(Transform::Size));
        assert_eq!(plan.single_output(), Some("members"));
    }

    #[test]
    fn test_value_transform_needs_collection() {
        let err = plan("userGroup", "name::size", &admin()).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::GistError::Schema(SchemaError::TransformNotApplicable { .. })
        ));
        assert!(plan("userGroup", "name::rename(title)", &admin()).is_ok());
    }

    #[test]
    fn test_pluck_arguments_must_be_persisted() {
        assert!(plan("userGroup", "users::pluck(id,surname)", &admin()).is_ok());
        let err = plan("userGroup", "users::pluck(displayName)", &admin()).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::GistError::Schema(SchemaError::NotPluckable { .. })
        ));
        let err = plan("userGroup", "users::pluck(userGroups)", &admin()).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::GistError::Schema(SchemaError::NotPluckable { .. })
        ));
    }

    #[test]
    fn test_presets() {
        let plan = plan("user", ":identifiable", &admin()).unwrap();
        assert_eq!(names(&plan), vec!["id", "name", "displayName"]);

        let simple = plan_simple();
        assert!(simple.iter().any(|n| n == "age"));
        assert!(!simple.iter().any(|n| n == "userGroups"));
        assert!(!simple.iter().any(|n| n == "displayName"));
    }

    fn plan_simple() -> Vec<String> {
        plan("user", ":simple", &admin())
            .unwrap()
            .fields
            .into_iter()
            .map(|f| f.output_name)
            .collect()
    }

    #[test]
    fn test_filter_includes_properties() {
        let registry = registry();
        let schema = registry.get("nested").unwrap().clone();
        let check = |fields: &str, path: &str| {
            filter_includes(&registry, &schema, &parse_fields(fields).unwrap(), path).unwrap()
        };
        assert!(check("*", "first.third.value"));
        assert!(check("first", "first.third.value"));
        assert!(!check("!first,first", "first.third.value"));
        assert!(!check("first,!first", "first.label"));
        assert!(check("*,first[third[!value]]", "first.third"));
        assert!(!check("*,first[third[!value]]", "first.third.value"));
        assert!(check("first[!label]", "first.third"));
    }
}
