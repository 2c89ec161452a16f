//! Object and field visibility

use crate::core::auth::Caller;
use crate::core::error::{AccessError, GistResult};
use crate::core::object::GistObject;
use crate::schema::{PropertyDescriptor, SchemaRegistry, TypeSchema};

/// Outcome of a readability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Readable,
    Denied,
}

impl AccessDecision {
    pub fn is_readable(self) -> bool {
        self == AccessDecision::Readable
    }

    fn from_bool(readable: bool) -> Self {
        if readable {
            AccessDecision::Readable
        } else {
            AccessDecision::Denied
        }
    }
}

/// Whether `caller` may read `property` of objects of `schema`
///
/// Restricted properties need the type's view authority; types without one
/// only expose them to superusers.
pub fn field_decision(
    caller: &Caller,
    schema: &TypeSchema,
    property: &PropertyDescriptor,
) -> AccessDecision {
    if !property.restricted {
        return AccessDecision::Readable;
    }
    let readable = match &schema.view_authority {
        Some(authority) => caller.has_authority(authority),
        None => caller.is_super(),
    };
    AccessDecision::from_bool(readable)
}

/// Whether `caller` may see `object` at all
pub fn object_decision(caller: &Caller, schema: &TypeSchema, object: &GistObject) -> AccessDecision {
    if !schema.shareable {
        return AccessDecision::Readable;
    }
    match &object.sharing {
        Some(sharing) => AccessDecision::from_bool(sharing.can_read(caller)),
        None => AccessDecision::Readable,
    }
}

/// Readability of a dotted property path on an object
///
/// The object must be visible and every property along the path readable.
/// Objects behind references are not consulted.
pub fn can_read(
    registry: &SchemaRegistry,
    caller: &Caller,
    object: &GistObject,
    property_path: &str,
) -> AccessDecision {
    let Some(mut schema) = registry.get(&object.type_name) else {
        return AccessDecision::Denied;
    };
    if !object_decision(caller, schema, object).is_readable() {
        return AccessDecision::Denied;
    }
    for segment in property_path.split('.').filter(|s| !s.is_empty()) {
        let Some(property) = schema.get(segment) else {
            return AccessDecision::Denied;
        };
        if !field_decision(caller, schema, property).is_readable() {
            return AccessDecision::Denied;
        }
        match property.kind.target_type().and_then(|t| registry.get(t)) {
            Some(next) => schema = next,
            None => break,
        }
    }
    AccessDecision::Readable
}

/// Fail unless `caller` may see `object`
pub fn require_readable(caller: &Caller, schema: &TypeSchema, object: &GistObject) -> GistResult<()> {
    if object_decision(caller, schema, object).is_readable() {
        return Ok(());
    }
    tracing::warn!(
        type_name = %schema.name,
        id = %object.id,
        caller = %caller.username,
        "object not readable"
    );
    Err(AccessError::ObjectNotReadable {
        type_display: schema.display.clone(),
        id: object.id.clone(),
    }
    .into())
}
