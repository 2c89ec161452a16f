//! Filter clauses
//!
//! A clause reads `path:operator[:argument]`, with several arguments written
//! as `[a,b,c]`. Clauses are checked completely (operator, arity, path and
//! argument types, users referenced by access operators) before any object
//! is read.
//!
//! ```text
//! filter=surname:like:admin
//! filter=userGroups:gt:2
//! filter=id:in:[a1,b2,c3]
//! filter=sharing:canRead:[<user id>]
//! ```

pub mod eval;

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::core::auth::{CAN_DATA_READ, CAN_DATA_WRITE, CAN_READ, CAN_WRITE, Caller, IdentityProvider};
use crate::core::error::{AccessError, GistResult, QueryError, SchemaError};
use crate::schema::{PropertyDescriptor, PropertyKind, SchemaRegistry, TypeSchema, ValueType};

pub use eval::{ObjectLookup, matches_all};

static ACCESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[rw_%]{2,8}$").expect("access pattern regex"));

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Null,
    NotNull,
    Empty,
    NotEmpty,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    ILike,
    NotILike,
    StartsWith,
    NotStartsWith,
    IStartsWith,
    NotIStartsWith,
    EndsWith,
    NotEndsWith,
    IEndsWith,
    NotIEndsWith,
    In,
    NotIn,
    CanRead,
    CanWrite,
    CanDataRead,
    CanDataWrite,
    CanAccess,
}

/// Number and shape of arguments an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No argument
    Unary,
    /// Exactly one argument
    Single,
    /// One or more arguments
    Multi,
    /// A user id
    User,
    /// A user id and an access pattern
    UserAndPattern,
}

impl Operator {
    /// Parse an operator token, case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.to_ascii_lowercase().as_str() {
            "null" => Operator::Null,
            "!null" => Operator::NotNull,
            "empty" => Operator::Empty,
            "!empty" => Operator::NotEmpty,
            "eq" => Operator::Eq,
            "!eq" | "neq" | "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "le" | "lte" => Operator::Le,
            "gt" => Operator::Gt,
            "ge" | "gte" => Operator::Ge,
            "like" => Operator::Like,
            "!like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "!ilike" => Operator::NotILike,
            "$like" => Operator::StartsWith,
            "!$like" => Operator::NotStartsWith,
            "$ilike" | "startswith" => Operator::IStartsWith,
            "!$ilike" | "!startswith" => Operator::NotIStartsWith,
            "like$" => Operator::EndsWith,
            "!like$" => Operator::NotEndsWith,
            "ilike$" | "endswith" => Operator::IEndsWith,
            "!ilike$" | "!endswith" => Operator::NotIEndsWith,
            "in" => Operator::In,
            "!in" => Operator::NotIn,
            "canread" => Operator::CanRead,
            "canwrite" => Operator::CanWrite,
            "candataread" => Operator::CanDataRead,
            "candatawrite" => Operator::CanDataWrite,
            "canaccess" => Operator::CanAccess,
            _ => return None,
        };
        Some(op)
    }

    pub fn arity(&self) -> Arity {
        use Operator::*;
        match self {
            Null | NotNull | Empty | NotEmpty => Arity::Unary,
            In | NotIn => Arity::Multi,
            CanRead | CanWrite | CanDataRead | CanDataWrite => Arity::User,
            CanAccess => Arity::UserAndPattern,
            _ => Arity::Single,
        }
    }

    /// Whether the operator tests sharing rather than a value
    pub fn is_access(&self) -> bool {
        matches!(self.arity(), Arity::User | Arity::UserAndPattern)
    }

    /// Whether the operator compares order or equality
    pub fn is_comparison(&self) -> bool {
        use Operator::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    /// Fixed access pattern of the user access operators
    pub fn access_pattern(&self) -> Option<&'static str> {
        match self {
            Operator::CanRead => Some(CAN_READ),
            Operator::CanWrite => Some(CAN_WRITE),
            Operator::CanDataRead => Some(CAN_DATA_READ),
            Operator::CanDataWrite => Some(CAN_DATA_WRITE),
            _ => None,
        }
    }
}

/// A validated filter clause
#[derive(Debug, Clone)]
pub struct FilterClause {
    pub path: Vec<String>,
    pub operator: Operator,
    pub args: Vec<String>,
    /// User whose access is tested by access operators
    pub subject: Option<Caller>,
    rendered: String,
}

impl FilterClause {
    /// Parse a single clause and check its arity
    ///
    /// Paths and argument types are checked by [`FilterClause::validate`].
    pub fn parse(clause: &str) -> Result<Self, QueryError> {
        let clause = clause.trim();
        let mut parts = clause.splitn(3, ':');
        let path = parts.next().unwrap_or_default().trim();
        let token = parts.next().unwrap_or_default().trim();
        if path.is_empty() || token.is_empty() {
            return Err(QueryError::MalformedFilter {
                clause: clause.to_string(),
            });
        }

        let operator = Operator::parse(token).ok_or_else(|| QueryError::UnknownOperator {
            clause: clause.to_string(),
            operator: token.to_string(),
        })?;
        let args = parse_args(parts.next().unwrap_or_default());
        let rendered = format!(
            "{}:{}:[{}]",
            path,
            token.to_ascii_lowercase(),
            args.join(", ")
        );

        let filter = Self {
            path: path.split('.').map(|s| s.trim().to_string()).collect(),
            operator,
            args,
            subject: None,
            rendered,
        };
        filter.check_arity()?;
        Ok(filter)
    }

    fn check_arity(&self) -> Result<(), QueryError> {
        let filter = self.rendered.clone();
        match (self.operator.arity(), self.args.len()) {
            (Arity::Unary, 0) => Ok(()),
            (Arity::Unary, _) => Err(QueryError::UnaryWithArgument { filter }),
            (_, 0) => Err(QueryError::MissingArgument { filter }),
            (Arity::Single | Arity::User, 1) | (Arity::Multi, _) => Ok(()),
            (Arity::Single | Arity::User, _) => Err(QueryError::TooManyArguments { filter }),
            (Arity::UserAndPattern, 1) => Err(QueryError::MissingAccessPattern { filter }),
            (Arity::UserAndPattern, 2) => {
                if ACCESS_PATTERN.is_match(&self.args[1]) {
                    Ok(())
                } else {
                    Err(QueryError::MaliciousPattern { filter })
                }
            }
            (Arity::UserAndPattern, _) => Err(QueryError::TooManyArguments { filter }),
        }
    }

    /// Check the path against the schema and the arguments against its type
    pub fn validate(&self, registry: &SchemaRegistry, schema: &TypeSchema) -> GistResult<()> {
        let property = resolve_path(registry, schema, &self.path)?;
        if self.operator.is_access() || self.operator.arity() == Arity::Unary {
            return Ok(());
        }

        let expected = match (&property.kind, self.operator) {
            (PropertyKind::Collection(_), op) if op.is_comparison() => Some(ValueType::Number),
            (PropertyKind::Scalar(t @ (ValueType::Number | ValueType::Boolean | ValueType::Date)), op)
                if op.is_comparison() || matches!(op, Operator::In | Operator::NotIn) =>
            {
                Some(*t)
            }
            _ => None,
        };
        if let Some(expected) = expected {
            for arg in &self.args {
                if !eval::parses_as(arg, expected) {
                    return Err(QueryError::InvalidArgument {
                        filter: self.rendered.clone(),
                        argument: arg.clone(),
                        expected: expected.describe().to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Access pattern tested by an access operator
    pub fn pattern(&self) -> Option<&str> {
        match self.operator {
            Operator::CanAccess => self.args.get(1).map(String::as_str),
            op => op.access_pattern(),
        }
    }

    /// Look up the user of an access operator and check the caller may manage it
    pub async fn bind_subject(
        &mut self,
        caller: &Caller,
        identity: &dyn IdentityProvider,
    ) -> GistResult<()> {
        if !self.operator.is_access() {
            return Ok(());
        }
        let Some(user_id) = self.args.first() else {
            return Err(QueryError::MissingArgument {
                filter: self.rendered.clone(),
            }
            .into());
        };
        let Some(user) = identity.find_user(user_id).await? else {
            return Err(QueryError::UnknownFilterUser {
                filter: self.rendered.clone(),
            }
            .into());
        };
        if !caller.can_manage(&user) {
            tracing::warn!(filter = %self.rendered, "access filter on unmanageable user");
            return Err(AccessError::FilterRequiresManage {
                filter: self.rendered.clone(),
            }
            .into());
        }
        self.subject = Some(user);
        Ok(())
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Split a `filter` parameter on commas outside of brackets
pub fn split_clauses(param: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in param.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => clauses.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    clauses.push(current);
    clauses
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Parse and validate every clause of the given `filter` parameters
pub async fn compile_filters(
    params: &[String],
    registry: &SchemaRegistry,
    schema: &TypeSchema,
    caller: &Caller,
    identity: &dyn IdentityProvider,
) -> GistResult<Vec<FilterClause>> {
    let mut filters = Vec::new();
    for param in params {
        for clause in split_clauses(param) {
            let filter = FilterClause::parse(&clause)?;
            filter.validate(registry, schema)?;
            filters.push(filter);
        }
    }
    // Syntax errors win over user lookups
    for filter in &mut filters {
        filter.bind_subject(caller, identity).await?;
    }
    Ok(filters)
}

/// Resolve a dotted property path to the descriptor of its last segment
pub fn resolve_path<'a>(
    registry: &'a SchemaRegistry,
    schema: &'a TypeSchema,
    path: &[String],
) -> GistResult<&'a PropertyDescriptor> {
    let mut current = schema;
    let mut segments = path.iter().peekable();
    while let Some(segment) = segments.next() {
        let property = current
            .get(segment)
            .ok_or_else(|| SchemaError::UnknownProperty {
                property: segment.clone(),
                type_name: current.name.clone(),
            })?;
        if segments.peek().is_none() {
            return Ok(property);
        }
        current = property
            .kind
            .target_type()
            .and_then(|t| registry.get(t))
            .map(|t| t.as_ref())
            .ok_or_else(|| SchemaError::UnknownProperty {
                property: segments.peek().map(|s| s.to_string()).unwrap_or_default(),
                type_name: property.name.clone(),
            })?;
    }
    Err(SchemaError::UnknownProperty {
        property: String::new(),
        type_name: schema.name.clone(),
    }
    .into())
}

fn parse_args(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let inner = match raw.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']').unwrap_or(rest),
        None if raw.is_empty() => return Vec::new(),
        None => return vec![raw.to_string()],
    };
    inner
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
