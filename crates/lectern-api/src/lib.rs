//! Axum HTTP API server.
//!
//! This crate provides:
//! - Upload, query and event-stream endpoints for lecture videos
//! - Static serving of stored frames and artifacts
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, ShutdownSignal};
