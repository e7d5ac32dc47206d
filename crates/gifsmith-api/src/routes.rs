//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cancel_job, delete_artifact, grayscale_artifact, health, list_jobs, load_job,
    merge_artifacts, ready, reprocess_job, serve_artifact, stream_events, upload,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, payload_too_large, rate_limit_middleware, request_id, request_logging,
    security_headers,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/upload", post(upload))
        .route("/jobs", get(list_jobs))
        .route("/load/:job_id", get(load_job))
        .route("/cancel/:job_id", post(cancel_job))
        .route("/reprocess/:job_id", post(reprocess_job));

    let artifact_routes = Router::new()
        .route("/output/:job_id/:filename", get(serve_artifact))
        .route("/output/:job_id/:filename", delete(delete_artifact))
        .route("/merge/:job_id", post(merge_artifacts))
        .route("/grayscale/:job_id/:filename", post(grayscale_artifact));

    let limited_routes = Router::new()
        .merge(job_routes)
        .merge(artifact_routes)
        .route("/stream/:job_id", get(stream_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(limited_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(payload_too_large))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
