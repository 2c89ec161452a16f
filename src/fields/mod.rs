//! Field selection language
//!
//! Selectors name the properties to project, with nested blocks, exclusions,
//! presets and per-field transforms:
//!
//! ```rust,ignore
//! use gist::fields::parse_fields;
//!
//! let fields = parse_fields("*,!sharing,users::pluck(id,surname)")?;
//! assert!(fields.test("name"));
//! assert!(!fields.test("sharing"));
//! ```

pub mod parser;
pub mod predicate;
pub mod transform;

pub use parser::{FieldsParseError, ParseErrorKind, parse_fields};
pub use predicate::Fields;
pub use transform::{Tier, Transform};
