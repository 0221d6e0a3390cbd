// Core modules
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod membership;
pub mod model;
pub mod types;

// Re-export key types and functions
pub use api::{ApiContext, AppState, create_router};
pub use config::{ClientConfig, PortalConfig};
pub use db::{DatabaseConfig, create_connection, ensure_schema};

use anyhow::Result;
use axum::Router;

/// Convenience function to connect the database and build the full router.
pub async fn create_app(config: &PortalConfig) -> Result<Router> {
    let state = ApiContext::connect(config).await?;
    Ok(create_router(state))
}
