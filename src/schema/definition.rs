//! Serializable type declarations, as found in configuration files
//!
//! ```yaml
//! types:
//!   - name: userGroup
//!     shareable: true
//!     properties:
//!       - name: name
//!         type: text
//!       - name: users
//!         collection: user
//! ```

use serde::{Deserialize, Serialize};

use super::{PropertyDescriptor, PropertyKind, TypeSchema, ValueType};
use crate::core::error::ConfigError;

/// Declaration of a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default)]
    pub shareable: bool,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_authority: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

/// Declaration of a property; exactly one of `type`, `embedded`,
/// `reference` or `collection` must be given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default = "default_true")]
    pub persisted: bool,
    #[serde(default)]
    pub restricted: bool,
}

fn default_true() -> bool {
    true
}

impl PropertyDefinition {
    pub fn to_descriptor(&self, type_name: &str) -> Result<PropertyDescriptor, ConfigError> {
        let kinds: Vec<PropertyKind> = [
            self.value_type.map(PropertyKind::Scalar),
            self.embedded.clone().map(PropertyKind::Embedded),
            self.reference.clone().map(PropertyKind::Reference),
            self.collection.clone().map(PropertyKind::Collection),
        ]
        .into_iter()
        .flatten()
        .collect();

        let [kind] = <[PropertyKind; 1]>::try_from(kinds).map_err(|kinds| {
            ConfigError::InvalidValue {
                field: format!("types.{}.properties.{}", type_name, self.name),
                value: format!("{} kinds", kinds.len()),
                message: "exactly one of type, embedded, reference or collection is required"
                    .to_string(),
            }
        })?;

        Ok(PropertyDescriptor {
            name: self.name.clone(),
            kind,
            persisted: self.persisted,
            restricted: self.restricted,
            source: super::PropertySource::Stored,
        })
    }
}

impl TypeDefinition {
    pub fn to_schema(&self) -> Result<TypeSchema, ConfigError> {
        let mut schema = if self.embedded {
            TypeSchema::embedded_type(&self.name)
        } else {
            TypeSchema::new(&self.name)
        };
        if let Some(plural) = &self.plural {
            schema = schema.plural(plural);
        }
        if let Some(display) = &self.display {
            schema = schema.display(display);
        }
        if self.shareable {
            schema = schema.shareable();
        }
        if let Some(authority) = &self.view_authority {
            schema = schema.view_authority(authority);
        }
        for property in &self.properties {
            schema = schema.property(property.to_descriptor(&self.name)?);
        }
        Ok(schema)
    }
}
