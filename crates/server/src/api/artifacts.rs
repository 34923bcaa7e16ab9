//! Read-only serving of manifests and media segments.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;
use dashpack_core::{JobId, MANIFEST_FILE_NAME};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

/// Content type of the adaptive-streaming manifest
pub const MANIFEST_CONTENT_TYPE: &str = "application/dash+xml";

/// Content type of media segments
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp4";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Serve a job's manifest
pub async fn serve_manifest(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = resolve(&state, &job_id, MANIFEST_FILE_NAME)?;
    send_file(path, MANIFEST_CONTENT_TYPE, request).await
}

/// Serve one media segment of a job
pub async fn serve_segment(
    State(state): State<Arc<AppState>>,
    Path((job_id, segment)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = resolve(&state, &job_id, &segment)?;
    let content_type = if segment.ends_with(".mpd") {
        MANIFEST_CONTENT_TYPE
    } else {
        SEGMENT_CONTENT_TYPE
    };
    send_file(path, content_type, request).await
}

fn not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "File not found")
}

fn resolve(state: &AppState, job_id: &str, name: &str) -> Result<PathBuf, ApiError> {
    let job_id = JobId::parse(job_id).ok_or_else(not_found)?;
    state
        .namespace()
        .resolve_artifact(&job_id, name)
        .ok_or_else(not_found)
}

/// Streams the file at `path`, honouring `Range` requests.
async fn send_file(
    path: PathBuf,
    content_type: &'static str,
    request: Request,
) -> Result<Response, ApiError> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(not_found()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read artifact");
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
            ));
        }
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    Ok(response)
}
