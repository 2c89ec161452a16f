//! Field transforms
//!
//! A transform is attached to a field with `::name(args)`, `~name(args)` or
//! `|name(args)`. The set of transforms is closed and every variant checks
//! its own argument count when it is parsed, so a [`Transform`] value is
//! always well formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::parser::ParseErrorKind;

/// Verbosity tier used by the `auto` transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Omit the field
    XS,
    /// Boolean telling whether the collection has elements
    S,
    /// Number of elements
    #[default]
    M,
    /// List of element ids
    L,
    /// List of `{ "id": ... }` objects
    XL,
}

impl FromStr for Tier {
    type Err = ParseErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XS" => Ok(Tier::XS),
            "S" => Ok(Tier::S),
            "M" => Ok(Tier::M),
            "L" => Ok(Tier::L),
            "XL" => Ok(Tier::XL),
            _ => Err(ParseErrorKind::InvalidTier {
                tier: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::XS => "XS",
            Tier::S => "S",
            Tier::M => "M",
            Tier::L => "L",
            Tier::XL => "XL",
        };
        f.write_str(s)
    }
}

/// A per-field transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Output the field under another name
    Rename(String),
    /// Reduce collection elements to one or two of their properties
    Pluck(Vec<String>),
    /// Whether the collection contains the given id
    Member(String),
    /// Whether the collection does not contain the given id
    NotMember(String),
    /// Pick a representation by tier; `None` means the request default
    Auto(Option<Tier>),
    Size,
    IsEmpty,
    IsNotEmpty,
    Ids,
    IdObjects,
}

impl Transform {
    /// Build a transform from its name and arguments
    ///
    /// Names are matched case-insensitively and both dashed and camel case
    /// spellings are accepted (`not-member`, `notMember`).
    pub fn from_parts(name: &str, args: Vec<String>) -> Result<Self, ParseErrorKind> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        let canonical = match normalized.as_str() {
            "rename" => "rename",
            "pluck" => "pluck",
            "member" => "member",
            "notmember" => "not-member",
            "auto" => "auto",
            "size" => "size",
            "isempty" => "is-empty",
            "isnotempty" => "is-not-empty",
            "ids" => "ids",
            "idobjects" => "id-objects",
            _ => {
                return Err(ParseErrorKind::UnknownTransforms {
                    names: name.to_string(),
                });
            }
        };

        let (min, max) = arity(canonical);
        if args.len() < min || args.len() > max {
            return Err(ParseErrorKind::TransformArity {
                transform: canonical.to_string(),
                expected: describe_arity(min, max),
                actual: args.len(),
            });
        }

        let mut args = args.into_iter();
        let transform = match canonical {
            "rename" => Transform::Rename(args.next().unwrap_or_default()),
            "pluck" => Transform::Pluck(args.collect()),
            "member" => Transform::Member(args.next().unwrap_or_default()),
            "not-member" => Transform::NotMember(args.next().unwrap_or_default()),
            "auto" => match args.next() {
                Some(tier) => Transform::Auto(Some(tier.parse()?)),
                None => Transform::Auto(None),
            },
            "size" => Transform::Size,
            "is-empty" => Transform::IsEmpty,
            "is-not-empty" => Transform::IsNotEmpty,
            "ids" => Transform::Ids,
            _ => Transform::IdObjects,
        };
        Ok(transform)
    }

    /// Canonical name used in messages and duplicate detection
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Rename(_) => "rename",
            Transform::Pluck(_) => "pluck",
            Transform::Member(_) => "member",
            Transform::NotMember(_) => "not-member",
            Transform::Auto(_) => "auto",
            Transform::Size => "size",
            Transform::IsEmpty => "is-empty",
            Transform::IsNotEmpty => "is-not-empty",
            Transform::Ids => "ids",
            Transform::IdObjects => "id-objects",
        }
    }

    pub fn is_rename(&self) -> bool {
        matches!(self, Transform::Rename(_))
    }

    /// Replace `auto` by the concrete transform of its tier
    ///
    /// Returns `None` for the `XS` tier, which drops the field.
    pub fn concretize(&self, default_tier: Tier) -> Option<Transform> {
        match self {
            Transform::Auto(tier) => match tier.unwrap_or(default_tier) {
                Tier::XS => None,
                Tier::S => Some(Transform::IsNotEmpty),
                Tier::M => Some(Transform::Size),
                Tier::L => Some(Transform::Ids),
                Tier::XL => Some(Transform::IdObjects),
            },
            other => Some(other.clone()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Rename(to) => write!(f, "rename({})", to),
            Transform::Pluck(props) => write!(f, "pluck({})", props.join(",")),
            Transform::Member(id) => write!(f, "member({})", id),
            Transform::NotMember(id) => write!(f, "not-member({})", id),
            Transform::Auto(Some(tier)) => write!(f, "auto({})", tier),
            other => f.write_str(other.name()),
        }
    }
}

fn arity(name: &str) -> (usize, usize) {
    match name {
        "rename" | "member" | "not-member" => (1, 1),
        "pluck" => (0, 2),
        "auto" => (0, 1),
        _ => (0, 0),
    }
}

fn describe_arity(min: usize, max: usize) -> String {
    if min == max {
        min.to_string()
    } else {
        format!("{} to {}", min, max)
    }
}
