//! API exposure modules
//!
//! An exposure consumes a `GistHost` and produces a router for its protocol.

pub mod rest;

pub use rest::RestExposure;
