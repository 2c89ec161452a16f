//! Type schemas
//!
//! Every type that can be queried is described by a [`TypeSchema`]: its
//! names and an ordered table of [`PropertyDescriptor`]s. Schemas are
//! registered once into a [`SchemaRegistry`], which is then shared read-only
//! between requests.
//!
//! # Example
//!
//! ```rust,ignore
//! use gist::schema::{PropertyDescriptor, SchemaRegistry, TypeSchema, ValueType};
//!
//! let registry = SchemaRegistry::builder()
//!     .register(
//!         TypeSchema::new("user")
//!             .shareable()
//!             .property(PropertyDescriptor::scalar("surname", ValueType::Text))
//!             .property(PropertyDescriptor::scalar("email", ValueType::Text).restricted()),
//!     )
//!     .build()?;
//!
//! let user = registry.lookup("users").unwrap();
//! assert!(user.get("email").unwrap().restricted);
//! ```

pub mod definition;
pub mod naming;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::{GistResult, SchemaError};

pub use definition::{PropertyDefinition, TypeDefinition};

/// Value type of a scalar property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Number,
    Boolean,
    Date,
    /// Arbitrary JSON, compared as text
    Json,
}

impl ValueType {
    /// Human readable name used in argument errors
    pub fn describe(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Json => "value",
        }
    }
}

/// Shape of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ValueType),
    /// Nested object stored inline, of the named (embedded) type
    Embedded(String),
    /// Id of an object of the named type
    Reference(String),
    /// Ids of objects of the named type
    Collection(String),
}

impl PropertyKind {
    /// Type of the nested, referenced or element objects
    pub fn target_type(&self) -> Option<&str> {
        match self {
            PropertyKind::Scalar(_) => None,
            PropertyKind::Embedded(t) | PropertyKind::Reference(t) | PropertyKind::Collection(t) => {
                Some(t)
            }
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyKind::Collection(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, PropertyKind::Scalar(_))
    }
}

/// Where the value of a property comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    /// The object's stored values (or its id for `id`)
    Stored,
    /// `displayName`, falling back to `name`
    DisplayName,
    /// The object's sharing block
    Sharing,
    /// Effective permissions of the caller on the object
    Access,
}

/// A declared property of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    /// Whether the value is stored (computed properties are not)
    pub persisted: bool,
    /// Readable only with the type's view authority
    pub restricted: bool,
    pub source: PropertySource,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            persisted: true,
            restricted: false,
            source: PropertySource::Stored,
        }
    }

    pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PropertyKind::Scalar(value_type))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::scalar(name, ValueType::Text)
    }

    pub fn embedded(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Embedded(type_name.into()))
    }

    pub fn reference(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Reference(type_name.into()))
    }

    pub fn collection(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Collection(type_name.into()))
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    pub fn computed(mut self, source: PropertySource) -> Self {
        self.persisted = false;
        self.source = source;
        self
    }

    /// Whether the property is a stored scalar (what `pluck` can extract)
    pub fn is_persisted_scalar(&self) -> bool {
        self.persisted && self.kind.is_scalar()
    }
}

/// Schema of one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    /// Singular name, e.g. `userGroup`
    pub name: String,
    /// Collection name, e.g. `userGroups`
    pub plural: String,
    /// Name used in messages, e.g. `UserGroup`
    pub display: String,
    pub identifiable: bool,
    pub shareable: bool,
    /// Only ever stored inline inside other objects
    pub embedded: bool,
    /// Authority needed to read restricted properties (superusers always can)
    pub view_authority: Option<String>,
    properties: IndexMap<String, PropertyDescriptor>,
}

impl TypeSchema {
    /// Start an identifiable, non-shareable type with derived names
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            plural: naming::pluralize(&name),
            display: naming::display_name(&name),
            name,
            identifiable: true,
            shareable: false,
            embedded: false,
            view_authority: None,
            properties: IndexMap::new(),
        }
    }

    /// Start a type that is only stored inline
    pub fn embedded_type(name: impl Into<String>) -> Self {
        Self {
            identifiable: false,
            embedded: true,
            ..Self::new(name)
        }
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    pub fn shareable(mut self) -> Self {
        self.shareable = true;
        self
    }

    pub fn view_authority(mut self, authority: impl Into<String>) -> Self {
        self.view_authority = Some(authority.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// Properties in declaration order, implicit ones included
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    /// Add the implicit `id`, `displayName`, `sharing` and `access` properties
    fn complete(mut self) -> Self {
        let mut properties = IndexMap::new();
        if self.identifiable && !self.properties.contains_key("id") {
            properties.insert("id".to_string(), PropertyDescriptor::text("id"));
        }
        properties.extend(std::mem::take(&mut self.properties));

        if properties.contains_key("name") && !properties.contains_key("displayName") {
            properties.insert(
                "displayName".to_string(),
                PropertyDescriptor::text("displayName").computed(PropertySource::DisplayName),
            );
        }
        if self.shareable {
            properties.entry("sharing".to_string()).or_insert_with(|| {
                let mut sharing = PropertyDescriptor::scalar("sharing", ValueType::Json);
                sharing.source = PropertySource::Sharing;
                sharing
            });
            properties.entry("access".to_string()).or_insert_with(|| {
                PropertyDescriptor::scalar("access", ValueType::Json)
                    .computed(PropertySource::Access)
            });
        }
        self.properties = properties;
        self
    }
}

/// Immutable set of registered type schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: IndexMap<String, Arc<TypeSchema>>,
    plurals: IndexMap<String, String>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Type by singular name
    pub fn get(&self, name: &str) -> Option<&Arc<TypeSchema>> {
        self.types.get(name)
    }

    /// Type by singular or plural name
    pub fn lookup(&self, name: &str) -> Option<&Arc<TypeSchema>> {
        self.types
            .get(name)
            .or_else(|| self.plurals.get(name).and_then(|n| self.types.get(n)))
    }

    /// Type addressed by a collection path segment (non-embedded types only)
    pub fn collection(&self, plural: &str) -> Option<&Arc<TypeSchema>> {
        self.lookup(plural).filter(|t| !t.embedded)
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeSchema>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collects type schemas and validates them into a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    types: Vec<TypeSchema>,
}

impl SchemaRegistryBuilder {
    /// Register a type; a later registration of the same name replaces it
    pub fn register(mut self, schema: TypeSchema) -> Self {
        self.types.retain(|t| t.name != schema.name);
        self.types.push(schema);
        self
    }

    /// Validate references between types and freeze the registry
    pub fn build(self) -> GistResult<SchemaRegistry> {
        let mut registry = SchemaRegistry::default();
        for schema in self.types {
            let schema = schema.complete();
            registry
                .plurals
                .insert(schema.plural.clone(), schema.name.clone());
            registry
                .types
                .insert(schema.name.clone(), Arc::new(schema));
        }

        for schema in registry.types.values() {
            for property in schema.properties() {
                let Some(target) = property.kind.target_type() else {
                    continue;
                };
                let Some(target_schema) = registry.types.get(target) else {
                    return Err(SchemaError::InvalidDefinition {
                        type_name: schema.name.clone(),
                        message: format!(
                            "property '{}' refers to unknown type '{}'",
                            property.name, target
                        ),
                    }
                    .into());
                };
                let embedded_kind = matches!(property.kind, PropertyKind::Embedded(_));
                if embedded_kind != target_schema.embedded {
                    return Err(SchemaError::InvalidDefinition {
                        type_name: schema.name.clone(),
                        message: format!(
                            "property '{}' must {}be declared embedded to hold '{}'",
                            property.name,
                            if target_schema.embedded { "" } else { "not " },
                            target
                        ),
                    }
                    .into());
                }
            }
        }

        tracing::debug!(types = registry.types.len(), "schema registry built");
        Ok(registry)
    }
}
