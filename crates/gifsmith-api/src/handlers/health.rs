//! Health check handlers.

use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }
}

/// Readiness check endpoint. The server cannot do useful work without
/// the ffmpeg binaries on PATH.
pub async fn ready() -> (StatusCode, Json<ReadinessResponse>) {
    let ffmpeg = match gifsmith_media::check_ffmpeg() {
        Ok(_) => CheckStatus::ok(),
        Err(err) => CheckStatus::error(err.to_string()),
    };
    let ffprobe = match gifsmith_media::check_ffprobe() {
        Ok(_) => CheckStatus::ok(),
        Err(err) => CheckStatus::error(err.to_string()),
    };

    let all_ok = ffmpeg.status == "ok" && ffprobe.status == "ok";
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if all_ok { "ready" } else { "not ready" }.to_string(),
            checks: ReadinessChecks { ffmpeg, ffprobe },
        }),
    )
}
