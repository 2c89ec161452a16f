//! Server module for building HTTP servers around the gist engine
//!
//! `GistServerBuilder` assembles a [`GistHost`] from configuration and
//! collaborators, and exposes it through REST:
//! - Gist and field-filter routes for every declared collection
//! - Data integrity summaries
//! - Health checks

pub mod builder;
pub mod exposure;
pub mod handlers;
pub mod host;
pub mod router;

pub use builder::GistServerBuilder;
pub use exposure::RestExposure;
pub use host::GistHost;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`
///
/// Falls back to `info` for this crate when `RUST_LOG` is unset. Calling it
/// again, or after another subscriber was installed, has no effect.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gist=info,tower_http=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
