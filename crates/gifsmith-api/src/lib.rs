//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart upload with content sniffing and per-client rate limits
//! - Server-sent event streams for live job progress
//! - Artifact serving, merging, grayscale conversion and deletion
//! - Prometheus metrics and security headers

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
