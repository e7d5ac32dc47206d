//! Application state.

use std::sync::Arc;

use gifsmith_engine::{EngineConfig, JobService, RateLimiter};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<JobService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create new application state with ffmpeg-backed processing.
    pub fn new(config: ApiConfig, engine_config: EngineConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            engine_config.rate_limit_window,
            engine_config.rate_limit_max_requests,
            engine_config.rate_limit_max_uploads,
        ));
        Self {
            config,
            service: Arc::new(JobService::new(engine_config)),
            limiter,
        }
    }

    /// Build state around a preassembled service. Used by tests that
    /// substitute the pipeline components.
    pub fn with_service(config: ApiConfig, service: Arc<JobService>) -> Self {
        let engine = service.config();
        let limiter = Arc::new(RateLimiter::new(
            engine.rate_limit_window,
            engine.rate_limit_max_requests,
            engine.rate_limit_max_uploads,
        ));
        Self {
            config,
            service,
            limiter,
        }
    }
}
