//! Typed error handling for gist queries
//!
//! Every failure of a gist request is synchronous and terminates the request
//! before any output is produced. Errors are grouped by category so that the
//! HTTP layer can map them onto a status code and a stable error code.
//!
//! # Error Categories
//!
//! - [`QueryError`]: malformed field selectors, filters, orders and parameters
//! - [`SchemaError`]: names that do not resolve against the type schema
//! - [`AccessError`]: fields or objects the caller may not see
//! - [`EntityError`]: unknown collections and missing objects
//! - [`ConfigError`]: configuration parsing and validation
//! - [`StorageError`]: failures reported by the object store
//!
//! # Example
//!
//! ```rust,ignore
//! use gist::prelude::*;
//!
//! match service.list(&request).await {
//!     Ok(doc) => println!("{}", doc),
//!     Err(GistError::Access(AccessError::FieldNotReadable { field, .. })) => {
//!         println!("{} is hidden", field);
//!     }
//!     Err(e) => eprintln!("{} ({})", e, e.status_code()),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

use crate::fields::FieldsParseError;

/// The main error type for gist requests
#[derive(Debug)]
pub enum GistError {
    /// Syntax and argument errors in the request
    Query(QueryError),

    /// Names that could not be resolved against the schema
    Schema(SchemaError),

    /// Access denied to a field, object or filter argument
    Access(AccessError),

    /// Unknown collections or objects
    Entity(EntityError),

    /// Configuration errors
    Config(ConfigError),

    /// Object store errors
    Storage(StorageError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for GistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GistError::Query(e) => write!(f, "{}", e),
            GistError::Schema(e) => write!(f, "{}", e),
            GistError::Access(e) => write!(f, "{}", e),
            GistError::Entity(e) => write!(f, "{}", e),
            GistError::Config(e) => write!(f, "{}", e),
            GistError::Storage(e) => write!(f, "{}", e),
            GistError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GistError::Query(e) => Some(e),
            GistError::Schema(e) => Some(e),
            GistError::Access(e) => Some(e),
            GistError::Entity(e) => Some(e),
            GistError::Config(e) => Some(e),
            GistError::Storage(e) => Some(e),
            GistError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GistError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GistError::Query(e) => e.status_code(),
            GistError::Schema(e) => e.status_code(),
            GistError::Access(_) => StatusCode::FORBIDDEN,
            GistError::Entity(e) => e.status_code(),
            GistError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GistError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GistError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            GistError::Query(e) => e.error_code(),
            GistError::Schema(e) => e.error_code(),
            GistError::Access(e) => e.error_code(),
            GistError::Entity(e) => e.error_code(),
            GistError::Config(_) => "CONFIG_ERROR",
            GistError::Storage(_) => "STORAGE_ERROR",
            GistError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            GistError::Schema(SchemaError::UnknownProperty {
                property,
                type_name,
            }) => Some(serde_json::json!({
                "property": property,
                "type": type_name
            })),
            GistError::Entity(EntityError::NotFound { type_name, id }) => {
                Some(serde_json::json!({
                    "type": type_name,
                    "id": id
                }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for GistError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors in the textual request: fields, filters, orders and parameters
///
/// Filter variants carry the filter rendered as `property:operator:[args]`
/// so that the message echoes exactly what was received.
#[derive(Debug)]
pub enum QueryError {
    /// Field selector could not be parsed
    InvalidFields { input: String, message: String },

    /// Filter clause is not of the form `path:operator[:argument]`
    MalformedFilter { clause: String },

    /// Filter operator is unknown
    UnknownOperator { clause: String, operator: String },

    /// Unary operator was given an argument
    UnaryWithArgument { filter: String },

    /// Binary operator is missing its argument
    MissingArgument { filter: String },

    /// Single argument operator was given several arguments
    TooManyArguments { filter: String },

    /// `canAccess` without a pattern argument
    MissingAccessPattern { filter: String },

    /// `canAccess` pattern outside the allowed alphabet
    MaliciousPattern { filter: String },

    /// Access filter referencing a user that does not exist
    UnknownFilterUser { filter: String },

    /// Argument cannot be interpreted as the property's value type
    InvalidArgument {
        filter: String,
        argument: String,
        expected: String,
    },

    /// Order expression is not `property[:asc|:desc]`
    InvalidOrder { order: String },

    /// Collection properties cannot be ordered by
    UnorderableProperty { property: String },

    /// Generic invalid query parameter
    InvalidParameter {
        name: String,
        value: String,
        message: String,
    },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidFields { input, message } => {
                write!(f, "Invalid fields `{}`: {}", input, message)
            }
            QueryError::MalformedFilter { clause } => {
                write!(
                    f,
                    "Filter `{}` must be of the form property:operator[:argument].",
                    clause
                )
            }
            QueryError::UnknownOperator { clause, operator } => {
                write!(f, "Filter `{}` uses unknown operator `{}`.", clause, operator)
            }
            QueryError::UnaryWithArgument { filter } => {
                write!(
                    f,
                    "Filter `{}` uses an unary operator and does not need an argument.",
                    filter
                )
            }
            QueryError::MissingArgument { filter } => {
                write!(
                    f,
                    "Filter `{}` uses a binary operator that does need an argument.",
                    filter
                )
            }
            QueryError::TooManyArguments { filter } => {
                write!(f, "Filter `{}` can only be used with a single argument.", filter)
            }
            QueryError::MissingAccessPattern { filter } => {
                write!(
                    f,
                    "Filter `{}` requires a user ID and a access pattern argument.",
                    filter
                )
            }
            QueryError::MaliciousPattern { filter } => {
                write!(
                    f,
                    "Filter `{}` pattern argument must be 2 to 8 letters allowing letters 'r', 'w', '_' and '%'.",
                    filter
                )
            }
            QueryError::UnknownFilterUser { filter } => {
                write!(
                    f,
                    "Filtering by user access in filter `{}` requires permissions to manage the user filtered by.",
                    filter
                )
            }
            QueryError::InvalidArgument {
                filter,
                argument,
                expected,
            } => {
                write!(
                    f,
                    "Filter `{}` argument `{}` is not a valid {}.",
                    filter, argument, expected
                )
            }
            QueryError::InvalidOrder { order } => {
                write!(
                    f,
                    "Order `{}` must be of the form property[:asc|:desc].",
                    order
                )
            }
            QueryError::UnorderableProperty { property } => {
                write!(f, "Property `{}` cannot be used as order property.", property)
            }
            QueryError::InvalidParameter {
                name,
                value,
                message,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for parameter '{}': {}",
                    value, name, message
                )
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl QueryError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::InvalidFields { .. } => "INVALID_FIELDS",
            QueryError::MalformedFilter { .. } => "MALFORMED_FILTER",
            QueryError::UnknownOperator { .. } => "UNKNOWN_FILTER_OPERATOR",
            QueryError::UnaryWithArgument { .. }
            | QueryError::MissingArgument { .. }
            | QueryError::TooManyArguments { .. }
            | QueryError::MissingAccessPattern { .. } => "FILTER_ARITY",
            QueryError::MaliciousPattern { .. } => "FILTER_PATTERN",
            QueryError::UnknownFilterUser { .. } => "FILTER_USER",
            QueryError::InvalidArgument { .. } => "FILTER_ARGUMENT",
            QueryError::InvalidOrder { .. } => "INVALID_ORDER",
            QueryError::UnorderableProperty { .. } => "UNORDERABLE_PROPERTY",
            QueryError::InvalidParameter { .. } => "INVALID_PARAMETER",
        }
    }
}

impl From<QueryError> for GistError {
    fn from(err: QueryError) -> Self {
        GistError::Query(err)
    }
}

impl From<FieldsParseError> for GistError {
    fn from(err: FieldsParseError) -> Self {
        GistError::Query(QueryError::InvalidFields {
            input: err.input().to_string(),
            message: err.to_string(),
        })
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors resolving names against the type schema
#[derive(Debug)]
pub enum SchemaError {
    /// Property does not exist in the type
    UnknownProperty { property: String, type_name: String },

    /// Preset (`:name`) is not known
    UnknownPreset { preset: String },

    /// Transform cannot be applied to the property
    TransformNotApplicable {
        field: String,
        transform: String,
        message: String,
    },

    /// Plucked property is not a persisted scalar of the element type
    NotPluckable {
        property: String,
        type_name: String,
        reason: String,
    },

    /// Schema declaration is inconsistent
    InvalidDefinition { type_name: String, message: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownProperty {
                property,
                type_name,
            } => {
                write!(f, "Property '{}' does not exist in {}", property, type_name)
            }
            SchemaError::UnknownPreset { preset } => {
                write!(f, "Field not supported: '{}'", preset)
            }
            SchemaError::TransformNotApplicable {
                field,
                transform,
                message,
            } => {
                write!(
                    f,
                    "Transformer `{}` cannot be applied to field `{}`: {}",
                    transform, field, message
                )
            }
            SchemaError::NotPluckable {
                property,
                type_name,
                reason,
            } => {
                write!(
                    f,
                    "Property '{}' of {} cannot be plucked: {}",
                    property, type_name, reason
                )
            }
            SchemaError::InvalidDefinition { type_name, message } => {
                write!(f, "Invalid schema for type '{}': {}", type_name, message)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

impl SchemaError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SchemaError::InvalidDefinition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::CONFLICT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::UnknownProperty { .. } => "UNKNOWN_PROPERTY",
            SchemaError::UnknownPreset { .. } => "UNKNOWN_PRESET",
            SchemaError::TransformNotApplicable { .. } => "TRANSFORM_NOT_APPLICABLE",
            SchemaError::NotPluckable { .. } => "NOT_PLUCKABLE",
            SchemaError::InvalidDefinition { .. } => "INVALID_SCHEMA",
        }
    }
}

impl From<SchemaError> for GistError {
    fn from(err: SchemaError) -> Self {
        GistError::Schema(err)
    }
}

// =============================================================================
// Access Errors
// =============================================================================

/// Errors raised by the visibility filter
#[derive(Debug)]
pub enum AccessError {
    /// A restricted field was explicitly requested
    FieldNotReadable { field: String, type_display: String },

    /// The object itself is not shared with the caller
    ObjectNotReadable { type_display: String, id: String },

    /// Access filter references a user the caller may not manage
    FilterRequiresManage { filter: String },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::FieldNotReadable {
                field,
                type_display,
            } => {
                write!(
                    f,
                    "Field '{}' is not readable as user is not allowed to view objects of type {}.",
                    field, type_display
                )
            }
            AccessError::ObjectNotReadable { type_display, id } => {
                write!(f, "User not allowed to view {} {}", type_display, id)
            }
            AccessError::FilterRequiresManage { filter } => {
                write!(
                    f,
                    "Filtering by user access in filter `{}` requires permissions to manage the user filtered by.",
                    filter
                )
            }
        }
    }
}

impl std::error::Error for AccessError {}

impl AccessError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::FieldNotReadable { .. } => "FIELD_NOT_READABLE",
            AccessError::ObjectNotReadable { .. } => "OBJECT_NOT_READABLE",
            AccessError::FilterRequiresManage { .. } => "FILTER_REQUIRES_MANAGE",
        }
    }
}

impl From<AccessError> for GistError {
    fn from(err: AccessError) -> Self {
        GistError::Access(err)
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors locating collections and objects
#[derive(Debug)]
pub enum EntityError {
    /// Object was not found
    NotFound { type_name: String, id: String },

    /// Collection (plural path segment) is not registered
    UnknownCollection { collection: String },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound { type_name, id } => {
                write!(f, "{} with id '{}' not found", type_name, id)
            }
            EntityError::UnknownCollection { collection } => {
                write!(f, "Unknown collection: {}", collection)
            }
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EntityError::NotFound { .. } => "OBJECT_NOT_FOUND",
            EntityError::UnknownCollection { .. } => "UNKNOWN_COLLECTION",
        }
    }
}

impl From<EntityError> for GistError {
    fn from(err: EntityError) -> Self {
        GistError::Entity(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Problems loading a gist configuration or type declarations
#[derive(Debug)]
pub enum ConfigError {
    /// YAML that does not deserialize into a `GistConfig`
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// A setting or type declaration that is out of range
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    FileNotFound { path: String },

    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError {
                file: Some(file),
                message,
            } => write!(f, "Gist configuration '{}' is not valid YAML: {}", file, message),
            ConfigError::ParseError {
                file: None,
                message,
            } => write!(f, "Gist configuration is not valid YAML: {}", message),
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => write!(f, "Setting `{}` = '{}' rejected: {}", field, value, message),
            ConfigError::FileNotFound { path } => {
                write!(f, "No gist configuration at {}", path)
            }
            ConfigError::IoError { message } => {
                write!(f, "Reading gist configuration failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for GistError {
    fn from(err: ConfigError) -> Self {
        GistError::Config(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Failures an `ObjectStore` implementation may report in typed form
#[derive(Debug)]
pub enum StorageError {
    /// The store rejected or failed a query for a type
    Query { type_name: String, message: String },

    /// The store could not be reached at all
    Unavailable { store: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Query { type_name, message } => {
                write!(f, "Querying objects of type {} failed: {}", type_name, message)
            }
            StorageError::Unavailable { store } => write!(f, "Object store {} is unavailable", store),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for GistError {
    fn from(err: StorageError) -> Self {
        GistError::Storage(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<std::io::Error> for GistError {
    fn from(err: std::io::Error) -> Self {
        GistError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for GistError {
    fn from(err: serde_yaml::Error) -> Self {
        GistError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

/// Collaborator failures surface as internal errors
impl From<anyhow::Error> for GistError {
    fn from(err: anyhow::Error) -> Self {
        GistError::Internal(err.to_string())
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for gist operations
pub type GistResult<T> = Result<T, GistError>;

// =============================================================================
// Tests
// =============================================================================
