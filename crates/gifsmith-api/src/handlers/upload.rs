//! Upload handler.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart};
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use gifsmith_engine::{StagedUpload, Submission};
use gifsmith_models::{Artifact, JobId, ProcessSettings};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Container formats accepted for upload, by extension.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "flv", "wmv"];

/// Bytes sniffed from the head of the upload for signature checks.
const SNIFF_LEN: usize = 32;

#[derive(Serialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub cached: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

/// Accept a multipart upload: a required `video` file plus optional
/// settings fields. The file is staged to a temp location and handed to
/// the job service, which decides between a cache hit and a fresh run.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut staged: Option<StagedUpload> = None;
    let mut settings = ProcessSettings::default();

    let result = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
        {
            match field.name().unwrap_or_default() {
                "video" => {
                    if staged.is_some() {
                        return Err(ApiError::bad_request("duplicate video field"));
                    }
                    staged = Some(stage_video_field(&state, field).await?);
                }
                "max_clip_duration" => settings.max_clip_duration = parse_field(field).await?,
                "fps" => settings.fps = parse_field(field).await?,
                "width" => settings.width = parse_field(field).await?,
                "sensitivity" => settings.sensitivity = parse_field(field).await?,
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }
        staged.take().ok_or_else(|| ApiError::bad_request("no video file provided"))
    }
    .await;

    let staged = match result {
        Ok(staged) => staged,
        Err(err) => {
            // A partially staged file must not leak on a later field error.
            if let Some(staged) = staged {
                let _ = tokio::fs::remove_file(&staged.temp_path).await;
            }
            return Err(err);
        }
    };

    match state.service.submit(staged, settings).await? {
        Submission::CacheHit { job_id, artifacts } => {
            metrics::record_upload(true);
            Ok(Json(UploadResponse {
                job_id,
                cached: true,
                artifacts,
            }))
        }
        Submission::Started { job_id } => {
            metrics::record_upload(false);
            Ok(Json(UploadResponse {
                job_id,
                cached: false,
                artifacts: Vec::new(),
            }))
        }
    }
}

/// Stream the video field to a temp file, validating the extension up
/// front and the content signature once enough bytes have arrived.
async fn stage_video_field(state: &AppState, mut field: Field<'_>) -> ApiResult<StagedUpload> {
    let filename = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::bad_request("video field has no filename"))?;
    let ext = allowed_extension(&filename)?;

    let upload_dir = state.service.config().upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("cannot create upload dir: {e}")))?;
    let temp_path = upload_dir.join(format!("staging-{}.part", Uuid::new_v4().simple()));

    match write_field(&mut field, &temp_path).await {
        Ok(()) => Ok(StagedUpload { temp_path, ext }),
        Err(err) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            Err(err)
        }
    }
}

async fn write_field(field: &mut Field<'_>, temp_path: &Path) -> ApiResult<()> {
    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| ApiError::internal(format!("cannot stage upload: {e}")))?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    let mut total: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("upload interrupted: {e}")))?
    {
        if header.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - header.len()).min(chunk.len());
            header.extend_from_slice(&chunk[..take]);
            if header.len() >= SNIFF_LEN && !gifsmith_media::is_video_header(&header) {
                warn!("upload rejected: content does not look like video");
                return Err(ApiError::bad_request("file content is not a video"));
            }
        }
        total += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("cannot stage upload: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("cannot stage upload: {e}")))?;

    if total == 0 {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    // Tiny files never hit the in-stream check above.
    if header.len() < SNIFF_LEN && !gifsmith_media::is_video_header(&header) {
        return Err(ApiError::bad_request("file content is not a video"));
    }
    Ok(())
}

async fn parse_field<T: std::str::FromStr>(field: Field<'_>) -> ApiResult<T> {
    let name = field.name().unwrap_or_default().to_string();
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed field {name}: {e}")))?;
    text.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid value for {name}")))
}

/// Validate the upload's extension against the allowlist, returning it
/// lowercased.
fn allowed_extension(filename: &str) -> ApiResult<String> {
    let ext = PathBuf::from(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ApiError::bad_request("file has no extension"))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::bad_request(format!(
            "unsupported file type .{ext}; accepted: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(ext)
}
