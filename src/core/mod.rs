//! Core module containing fundamental types and collaborator traits

pub mod auth;
pub mod error;
pub mod object;
pub mod query;
pub mod service;

pub use auth::{AccessSummary, AnonymousIdentityProvider, Caller, IdentityProvider, Sharing};
pub use error::{ErrorResponse, GistError, GistResult};
pub use object::GistObject;
pub use query::{Direction, GistParams, Junction, OrderClause};
pub use service::{ObjectStore, PageWindow, StoreQuery};
