//! Job lifecycle handlers: listing, inspection, cancel, reprocess.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use gifsmith_engine::{JobRecord, Submission};
use gifsmith_models::{Artifact, JobId, JobState, ProcessSettings};

use crate::error::ApiResult;
use crate::handlers::parse_job_id;
use crate::state::AppState;

/// Compact job entry for listings.
#[derive(Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub state: JobState,
    pub artifact_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobRecord> for JobSummary {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            state: record.state,
            artifact_count: record.artifacts.len(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Full job view with artifacts and settings.
#[derive(Serialize)]
pub struct JobDetail {
    pub job_id: JobId,
    pub state: JobState,
    pub settings: ProcessSettings,
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobRecord> for JobDetail {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            state: record.state,
            settings: record.settings,
            artifacts: record.artifacts,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// List all known jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    Json(
        state
            .service
            .list_jobs()
            .into_iter()
            .map(JobSummary::from)
            .collect(),
    )
}

/// Load one job with its artifacts.
pub async fn load_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<JobDetail>> {
    let job_id = parse_job_id(&raw_id)?;
    let record = state.service.load_job(job_id)?;
    Ok(Json(JobDetail::from(record)))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelling: bool,
}

/// Request cancellation of an active job. The pipeline stops at its
/// next checkpoint; clips already produced stay available.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job_id = parse_job_id(&raw_id)?;
    state.service.cancel(job_id)?;
    Ok(Json(CancelResponse {
        job_id,
        cancelling: true,
    }))
}

#[derive(Serialize)]
pub struct ReprocessResponse {
    pub job_id: JobId,
}

/// Re-run a finished job's input with new settings. The body carries a
/// full or partial settings object; missing fields take their defaults.
pub async fn reprocess_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    settings: Option<Json<ProcessSettings>>,
) -> ApiResult<Json<ReprocessResponse>> {
    let job_id = parse_job_id(&raw_id)?;
    let settings = settings.map(|Json(s)| s).unwrap_or_default();

    match state.service.reprocess(job_id, settings).await? {
        Submission::Started { job_id } => Ok(Json(ReprocessResponse { job_id })),
        // Reprocess always clears the cache first, so a hit cannot occur.
        Submission::CacheHit { job_id, .. } => Ok(Json(ReprocessResponse { job_id })),
    }
}
