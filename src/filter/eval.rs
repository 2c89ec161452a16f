//! In-memory evaluation of filter clauses
//!
//! Paths traverse embedded and referenced objects and fan out over
//! collections; a clause holds when any reached value satisfies it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

use super::{FilterClause, Operator};
use crate::core::object::{GistObject, collection_ids};
use crate::core::query::Junction;
use crate::schema::{PropertyDescriptor, PropertyKind, PropertySource, SchemaRegistry, TypeSchema, ValueType};

/// Access to objects referenced by the one being tested
pub trait ObjectLookup {
    fn lookup(&self, type_name: &str, id: &str) -> Option<&GistObject>;
}

/// Whether `object` satisfies the clauses combined with `junction`
///
/// No clauses always match.
pub fn matches_all(
    filters: &[FilterClause],
    junction: Junction,
    object: &GistObject,
    registry: &SchemaRegistry,
    lookup: &dyn ObjectLookup,
) -> bool {
    if filters.is_empty() {
        return true;
    }
    let mut results = filters.iter().map(|f| f.matches(object, registry, lookup));
    match junction {
        Junction::And => results.all(|r| r),
        Junction::Or => results.any(|r| r),
    }
}

#[derive(Clone, Copy)]
enum Node<'a> {
    Object(&'a GistObject),
    Inline(&'a Map<String, Value>, Option<&'a GistObject>),
}

impl<'a> Node<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        match self {
            Node::Object(o) => o.values.get(name),
            Node::Inline(map, _) => map.get(name),
        }
    }

    /// Closest identifiable object, whose sharing access operators test
    fn owner(&self) -> Option<&'a GistObject> {
        match self {
            Node::Object(o) => Some(*o),
            Node::Inline(_, owner) => *owner,
        }
    }

    fn value_of(&self, property: &PropertyDescriptor) -> Option<Cow<'a, Value>> {
        match (self, property.source) {
            (Node::Object(o), PropertySource::Stored) if property.name == "id" => {
                Some(Cow::Owned(Value::String(o.id.clone())))
            }
            (_, PropertySource::Stored) => self.get(&property.name).map(Cow::Borrowed),
            (_, PropertySource::DisplayName) => self
                .get("displayName")
                .or_else(|| self.get("name"))
                .map(Cow::Borrowed),
            (Node::Object(o), PropertySource::Sharing) => o
                .sharing
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok())
                .map(Cow::Owned),
            _ => None,
        }
    }
}

struct Reached<'a> {
    value: Option<Cow<'a, Value>>,
    property: &'a PropertyDescriptor,
    owner: Option<&'a GistObject>,
}

impl FilterClause {
    /// Evaluate the clause against one object
    pub fn matches(
        &self,
        object: &GistObject,
        registry: &SchemaRegistry,
        lookup: &dyn ObjectLookup,
    ) -> bool {
        let Some(schema) = registry.get(&object.type_name) else {
            return false;
        };
        let mut reached = Vec::new();
        walk(Node::Object(object), schema, &self.path, registry, lookup, &mut reached);

        if reached.is_empty() {
            // Nothing reachable behaves like a single absent value
            return match super::resolve_path(registry, schema, &self.path) {
                Ok(property) => self.test(None, property, None),
                Err(_) => false,
            };
        }
        reached
            .iter()
            .any(|r| self.test(r.value.as_deref(), r.property, r.owner))
    }

    fn test(
        &self,
        value: Option<&Value>,
        property: &PropertyDescriptor,
        owner: Option<&GistObject>,
    ) -> bool {
        use Operator::*;
        let value = value.filter(|v| !v.is_null());
        match self.operator {
            Null => value.is_none(),
            NotNull => value.is_some(),
            Empty => is_empty(value),
            NotEmpty => !is_empty(value),
            Eq | Lt | Le | Gt | Ge => self.compare(value, property),
            Ne => !self.compare(value, property),
            Like | ILike | StartsWith | IStartsWith | EndsWith | IEndsWith => self.like(value),
            NotLike | NotILike | NotStartsWith | NotIStartsWith | NotEndsWith | NotIEndsWith => {
                !self.like(value)
            }
            In => self.member(value, property),
            NotIn => !self.member(value, property),
            CanRead | CanWrite | CanDataRead | CanDataWrite | CanAccess => {
                let (Some(subject), Some(pattern)) = (self.subject.as_ref(), self.pattern()) else {
                    return false;
                };
                match owner.and_then(|o| o.sharing.as_ref()) {
                    Some(sharing) => sharing.grants(subject, pattern),
                    None => true,
                }
            }
        }
    }

    fn compare(&self, value: Option<&Value>, property: &PropertyDescriptor) -> bool {
        let Some(value) = value else {
            return false;
        };
        let Some(arg) = self.args.first() else {
            return false;
        };
        let ordering = match &property.kind {
            PropertyKind::Collection(_) => {
                let size = collection_ids(Some(value)).len() as f64;
                arg.parse::<f64>().ok().and_then(|n| size.partial_cmp(&n))
            }
            PropertyKind::Scalar(value_type) => compare_scalar(value, arg, *value_type),
            _ => Some(str::cmp(&value_text(value), arg)),
        };
        let Some(ordering) = ordering else {
            return false;
        };
        match self.operator {
            Operator::Eq | Operator::Ne => ordering == Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            _ => false,
        }
    }

    fn like(&self, value: Option<&Value>) -> bool {
        let (Some(value), Some(pattern)) = (value, self.args.first()) else {
            return false;
        };
        let text = value_text(value);
        use Operator::*;
        let insensitive = matches!(
            self.operator,
            ILike | NotILike | IStartsWith | NotIStartsWith | IEndsWith | NotIEndsWith
        );
        let (text, pattern) = if insensitive {
            (text.to_lowercase(), pattern.to_lowercase())
        } else {
            (text.into_owned(), pattern.clone())
        };
        match self.operator {
            StartsWith | NotStartsWith | IStartsWith | NotIStartsWith => text.starts_with(&pattern),
            EndsWith | NotEndsWith | IEndsWith | NotIEndsWith => text.ends_with(&pattern),
            _ if pattern.contains(['*', '?']) => wildcard_matches(&text, &pattern),
            _ => text.contains(&pattern),
        }
    }

    fn member(&self, value: Option<&Value>, property: &PropertyDescriptor) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &property.kind {
            PropertyKind::Collection(_) => collection_ids(Some(value))
                .iter()
                .any(|id| self.args.iter().any(|a| a == id)),
            PropertyKind::Scalar(value_type) => self
                .args
                .iter()
                .any(|a| compare_scalar(value, a, *value_type) == Some(Ordering::Equal)),
            _ => {
                let text = value_text(value);
                self.args.iter().any(|a| a.as_str() == &*text)
            }
        }
    }
}

fn walk<'a>(
    node: Node<'a>,
    schema: &'a TypeSchema,
    path: &[String],
    registry: &'a SchemaRegistry,
    lookup: &'a dyn ObjectLookup,
    out: &mut Vec<Reached<'a>>,
) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let Some(property) = schema.get(first) else {
        return;
    };
    if rest.is_empty() {
        out.push(Reached {
            value: node.value_of(property),
            property,
            owner: node.owner(),
        });
        return;
    }
    let Some(target) = property.kind.target_type().and_then(|t| registry.get(t)) else {
        return;
    };
    match &property.kind {
        PropertyKind::Embedded(_) => {
            if let Some(Value::Object(map)) = node.get(first) {
                walk(Node::Inline(map, node.owner()), target, rest, registry, lookup, out);
            }
        }
        PropertyKind::Reference(_) => {
            let referenced = node
                .get(first)
                .and_then(Value::as_str)
                .and_then(|id| lookup.lookup(&target.name, id));
            if let Some(object) = referenced {
                walk(Node::Object(object), target, rest, registry, lookup, out);
            }
        }
        PropertyKind::Collection(_) => {
            for id in collection_ids(node.get(first)) {
                if let Some(object) = lookup.lookup(&target.name, id) {
                    walk(Node::Object(object), target, rest, registry, lookup, out);
                }
            }
        }
        PropertyKind::Scalar(_) => {}
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Text form of a value: strings as-is, anything else as JSON
pub fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

fn compare_scalar(value: &Value, arg: &str, value_type: ValueType) -> Option<Ordering> {
    match value_type {
        ValueType::Number => {
            let left = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let right: f64 = arg.trim().parse().ok()?;
            left.partial_cmp(&right)
        }
        ValueType::Boolean => {
            let left = match value {
                Value::Bool(b) => *b,
                Value::String(s) => parse_bool(s)?,
                _ => return None,
            };
            Some(left.cmp(&parse_bool(arg)?))
        }
        ValueType::Date => {
            let left = parse_date(value.as_str()?)?;
            let right = parse_date(arg)?;
            Some(left.cmp(&right))
        }
        ValueType::Text | ValueType::Json => Some(str::cmp(&value_text(value), arg)),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse `now`, RFC 3339 timestamps, local date-times and plain dates
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Some(Utc::now());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Whether a filter argument can be read as `value_type`
pub fn parses_as(arg: &str, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Number => arg.trim().parse::<f64>().is_ok(),
        ValueType::Boolean => parse_bool(arg).is_some(),
        ValueType::Date => parse_date(arg).is_some(),
        ValueType::Text | ValueType::Json => true,
    }
}

/// Full match with `*` for any run of characters and `?` for one
///
/// The pattern is compiled to a `regex`, which matches in linear time.
fn wildcard_matches(text: &str, pattern: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        if c == '*' || c == '?' {
            translated.push_str(&regex::escape(&literal));
            literal.clear();
            translated.push_str(if c == '*' { ".*" } else { "." });
        } else {
            literal.push(c);
        }
    }
    translated.push_str(&regex::escape(&literal));
    translated.push('$');
    Regex::new(&translated).is_ok_and(|re| re.is_match(text))
}
