//! Video upload handler.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

/// Message returned once a job has been submitted
pub const UPLOAD_ACCEPTED_MESSAGE: &str = "Video uploaded, processing started";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Response for an accepted upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub job_id: String,
}

/// Accept a multipart video upload and start transcoding it
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let upload = &state.config().upload;
    let upload_dir = &state.config().storage.upload_dir;

    let mut input: Option<PathBuf> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(upload.field_name.as_str()) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("video/") {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Only video files are allowed",
            ));
        }

        let path = upload_dir.join(stored_file_name(field.file_name()));
        let size = store_field(field, &path, upload.max_bytes).await?;
        debug!(path = %path.display(), size, content_type = %content_type, "Stored upload");
        input = Some(path);
        break;
    }

    let input = input.ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("No video file provided in field '{}'", upload.field_name),
        )
    })?;

    match state.coordinator().submit(&input).await {
        Ok(job_id) => {
            info!(job_id = %job_id, input = %input.display(), "Upload accepted");
            Ok((
                StatusCode::ACCEPTED,
                Json(UploadResponse {
                    message: UPLOAD_ACCEPTED_MESSAGE.to_string(),
                    job_id: job_id.to_string(),
                }),
            ))
        }
        Err(e) => {
            warn!(input = %input.display(), error = %e, "Failed to submit upload");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    job_id: e.job_id().map(|id| id.to_string()),
                }),
            ))
        }
    }
}

/// Streams one field to `path`, enforcing `max_bytes`. Partial files are removed on error.
async fn store_field(mut field: Field<'_>, path: &Path, max_bytes: u64) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to create upload file");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload")
    })?;

    let result: Result<u64, ApiError> = async {
        let mut written: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("File exceeds the {} byte limit", max_bytes),
                ));
            }
            file.write_all(&chunk).await.map_err(|e| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to store upload: {}", e),
                )
            })?;
        }

        if written == 0 {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Uploaded file is empty",
            ));
        }

        file.flush().await.map_err(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store upload: {}", e),
            )
        })?;
        Ok(written)
    }
    .await;

    if result.is_err() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }

    result
}

fn multipart_error(e: MultipartError) -> ApiError {
    (e.status(), Json(ErrorResponse::new(e.body_text())))
}

/// Generated storage name, keeping a short alphanumeric extension from the client name.
fn stored_file_name(original: Option<&str>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) => format!("{}.{}", id, ext),
        None => id,
    }
}
