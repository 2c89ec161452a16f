//! The gist query engine
//!
//! A request flows through the modules in this order:
//!
//! 1. [`resolver`] turns the parsed `fields` selection into a [`Plan`],
//!    checking names, presets, transforms and field permissions.
//! 2. Filters and orders are compiled (see [`crate::filter`] and [`paging`]).
//! 3. The store lists the matching objects, [`graph`] prefetches whatever
//!    the plan expands.
//! 4. [`projection`] renders each object, [`paging`] adds the pager.
//!
//! [`service::GistService`] ties the steps together.

pub mod access;
pub mod graph;
pub mod paging;
pub mod projection;
pub mod resolver;
pub mod service;

pub use access::{AccessDecision, can_read, field_decision, object_decision};
pub use graph::ObjectGraph;
pub use paging::{Pager, page_link, validate_orders};
pub use projection::{ProjectionOptions, Projector};
pub use resolver::{Mode, Plan, ResolveOptions, ResolvedField, Shape, filter_includes, resolve};
pub use service::{GistRequest, GistService};
