//! service-core: Shared infrastructure for the reading services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use mongodb;
pub use serde_json;
pub use tokio;
pub use tracing;
