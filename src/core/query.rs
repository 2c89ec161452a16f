//! Query parameters of gist requests

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::error::{GistResult, QueryError};
use crate::fields::Tier;

/// How several filters are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Junction {
    #[default]
    And,
    Or,
}

impl FromStr for Junction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Junction::And),
            "OR" => Ok(Junction::Or),
            _ => Err(invalid("rootJunction", s, "expected AND or OR")),
        }
    }
}

/// Sort direction of an order clause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A parsed `property[:asc|:desc]` order clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub property: String,
    pub direction: Direction,
}

impl OrderClause {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let input = input.trim();
        let (property, direction) = match input.split_once(':') {
            Some((property, direction)) => {
                let direction = match direction.to_ascii_lowercase().as_str() {
                    "asc" => Direction::Asc,
                    "desc" => Direction::Desc,
                    _ => {
                        return Err(QueryError::InvalidOrder {
                            order: input.to_string(),
                        });
                    }
                };
                (property, direction)
            }
            None => (input, Direction::Asc),
        };
        if property.is_empty() {
            return Err(QueryError::InvalidOrder {
                order: input.to_string(),
            });
        }
        Ok(Self {
            property: property.to_string(),
            direction,
        })
    }
}

/// Parameters of a gist or field filter request
///
/// Built from the raw query pairs so that `filter` and `order` may repeat.
///
/// # Example
/// ```text
/// GET /users/gist?fields=id,surname&filter=surname:like:admin&order=surname:desc
///     &page=2&pageSize=10&total=true&pageListName=people
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GistParams {
    pub fields: Option<String>,
    pub filters: Vec<String>,
    pub root_junction: Junction,
    pub order: Vec<OrderClause>,
    pub page: usize,
    pub page_size: Option<usize>,
    pub total: bool,
    pub page_list_name: Option<String>,
    pub headless: bool,
    pub auto: Option<Tier>,
    pub references: Option<bool>,
    pub absolute_urls: bool,
}

impl Default for GistParams {
    fn default() -> Self {
        Self {
            fields: None,
            filters: Vec::new(),
            root_junction: Junction::And,
            order: Vec::new(),
            page: default_page(),
            page_size: None,
            total: false,
            page_list_name: None,
            headless: false,
            auto: None,
            references: None,
            absolute_urls: false,
        }
    }
}

fn default_page() -> usize {
    1
}

impl GistParams {
    /// Parse raw query pairs; unknown parameters are ignored
    pub fn from_pairs(pairs: &[(String, String)]) -> GistResult<Self> {
        let mut params = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "fields" => {
                    params.fields = Some(match params.fields.take() {
                        Some(previous) => format!("{},{}", previous, value),
                        None => value.clone(),
                    })
                }
                "filter" => params.filters.push(value.clone()),
                "rootJunction" => params.root_junction = value.parse()?,
                "order" => {
                    for clause in value.split(',').filter(|s| !s.trim().is_empty()) {
                        params.order.push(OrderClause::parse(clause)?);
                    }
                }
                "page" => params.page = parse_number(name, value)?,
                "pageSize" => params.page_size = Some(parse_number(name, value)?),
                "total" => params.total = parse_bool(name, value)?,
                "pageListName" => params.page_list_name = Some(value.clone()),
                "headless" => params.headless = parse_bool(name, value)?,
                "auto" => {
                    params.auto = Some(
                        value
                            .parse()
                            .map_err(|e: crate::fields::ParseErrorKind| {
                                invalid(name, value, &e.to_string())
                            })?,
                    )
                }
                "references" => params.references = Some(parse_bool(name, value)?),
                "absoluteUrls" => params.absolute_urls = parse_bool(name, value)?,
                _ => {}
            }
        }
        Ok(params)
    }

    /// Page number, at least 1
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Page size clamped to `1..=max`, `default` when not given
    pub fn page_size(&self, default: usize, max: usize) -> usize {
        self.page_size.unwrap_or(default).clamp(1, max.max(1))
    }
}

fn invalid(name: &str, value: &str, message: &str) -> QueryError {
    QueryError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, QueryError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(name, value, "expected a positive number"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, QueryError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}
