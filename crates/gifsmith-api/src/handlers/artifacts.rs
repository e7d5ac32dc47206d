//! Artifact handlers: serving, merging, grayscale, deletion.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use gifsmith_models::{Artifact, JobId};

use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_job_id;
use crate::state::AppState;

/// Serve one artifact file. The service layer enforces the filename
/// grammar and directory containment before any filesystem access.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path((raw_id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let job_id = parse_job_id(&raw_id)?;
    let path = state.service.artifact_path(job_id, &filename)?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("cannot read artifact: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/gif".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub filenames: Vec<String>,
}

#[derive(Serialize)]
pub struct ArtifactResponse {
    pub job_id: JobId,
    pub artifact: Artifact,
}

/// Concatenate several of a job's clips into a new merged artifact.
pub async fn merge_artifacts(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<ArtifactResponse>> {
    let job_id = parse_job_id(&raw_id)?;
    let artifact = state.service.merge(job_id, &request.filenames).await?;
    Ok(Json(ArtifactResponse { job_id, artifact }))
}

/// Produce the grayscale variant of one clip. Idempotent: an existing
/// variant is returned as-is.
pub async fn grayscale_artifact(
    State(state): State<AppState>,
    Path((raw_id, filename)): Path<(String, String)>,
) -> ApiResult<Json<ArtifactResponse>> {
    let job_id = parse_job_id(&raw_id)?;
    let artifact = state.service.grayscale(job_id, &filename).await?;
    Ok(Json(ArtifactResponse { job_id, artifact }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub job_id: JobId,
    pub deleted: String,
}

/// Delete one artifact from a job.
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path((raw_id, filename)): Path<(String, String)>,
) -> ApiResult<Json<DeleteResponse>> {
    let job_id = parse_job_id(&raw_id)?;
    state.service.delete_artifact(job_id, &filename).await?;
    Ok(Json(DeleteResponse {
        job_id,
        deleted: filename,
    }))
}
