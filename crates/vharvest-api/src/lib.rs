//! Axum HTTP API for the batch harvester.
//!
//! This crate provides:
//! - Batch control routes (start, stop, progress, retry, reset)
//! - Item detail lookup with presigned media links
//! - Health/readiness probes and Prometheus metrics

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
pub use state::AppState;
