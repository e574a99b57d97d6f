//! HTTP surface and process wiring for itemflow.

pub mod config;
pub mod error;
pub mod routes;

pub use config::{CliArgs, ServerConfig};
pub use routes::{router, AppState};
