//! VDP Sandbox Server: HTTP backend for the developer sandbox UI
//!
//! Exposes the [`vdp_sandbox`] pipeline over JSON endpoints: saved
//! credentials, the signing proxy, stored-key decryption and a health report.
//! See [`routes`] for the route table.

#![warn(missing_docs)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from axum, josekit and reqwest"
)]

pub mod config;
pub mod error;
pub mod observability;
pub mod routes;
pub mod state;

pub use config::{Cli, ServerConfig};
pub use error::{ApiError, ConfigError, ServerError};
pub use routes::router;
pub use state::AppState;
