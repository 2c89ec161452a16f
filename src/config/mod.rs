//! Configuration loading and management

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{ConfigError, GistResult};
use crate::fields::Tier;
use crate::schema::{SchemaRegistry, TypeDefinition};

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:3000`
    pub bind: String,

    /// Prefix of absolute links (`absoluteUrls=true`)
    pub base_url: String,

    /// Request header carrying the caller's user id
    pub identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            base_url: "http://localhost:3000".to_string(),
            identity_header: "x-user-id".to_string(),
        }
    }
}

/// Listing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
        }
    }
}

/// Projection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Tier used by `auto` when the request names none
    pub default_tier: Tier,

    /// Depth at which implicit expansion stops
    pub max_depth: usize,

    /// Whether `apiEndpoints` are rendered unless the request says otherwise
    pub references: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            default_tier: Tier::M,
            max_depth: 8,
            references: true,
        }
    }
}

/// Complete configuration of a gist server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GistConfig {
    pub server: ServerConfig,
    pub paging: PagingConfig,
    pub projection: ProjectionConfig,

    /// Declared types
    pub types: Vec<TypeDefinition>,
}

impl GistConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> GistResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> GistResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.paging.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "paging.default_page_size".to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.paging.max_page_size < self.paging.default_page_size {
            return Err(ConfigError::InvalidValue {
                field: "paging.max_page_size".to_string(),
                value: self.paging.max_page_size.to_string(),
                message: "must not be smaller than default_page_size".to_string(),
            });
        }
        Ok(())
    }

    /// Combine with another configuration
    ///
    /// Settings of `other` win; types are merged by name, `other` replacing
    /// earlier declarations.
    pub fn merge(mut self, other: GistConfig) -> Self {
        self.server = other.server;
        self.paging = other.paging;
        self.projection = other.projection;
        for definition in other.types {
            match self.types.iter_mut().find(|t| t.name == definition.name) {
                Some(existing) => *existing = definition,
                None => self.types.push(definition),
            }
        }
        self
    }

    /// Build the schema registry of the declared types
    pub fn build_registry(&self) -> GistResult<SchemaRegistry> {
        let mut builder = SchemaRegistry::builder();
        for definition in &self.types {
            builder = builder.register(definition.to_schema()?);
        }
        builder.build()
    }

    /// Create a default configuration for testing
    ///
    /// Declares `user` and `userGroup` the way a typical deployment does.
    pub fn default_config() -> Self {
        const TYPES: &str = r#"
types:
  - name: user
    shareable: true
    view_authority: F_USER_VIEW
    properties:
      - name: name
        type: text
      - name: surname
        type: text
      - name: code
        type: text
      - name: email
        type: text
        restricted: true
      - name: disabled
        type: boolean
        restricted: true
      - name: created
        type: date
      - name: createdBy
        reference: user
      - name: userGroups
        collection: userGroup
  - name: userGroup
    shareable: true
    properties:
      - name: name
        type: text
      - name: code
        type: text
      - name: managedBy
        reference: user
      - name: users
        collection: user
"#;
        let types = serde_yaml::from_str::<GistConfig>(TYPES)
            .map(|c| c.types)
            .unwrap_or_default();
        Self {
            types,
            ..Self::default()
        }
    }
}
