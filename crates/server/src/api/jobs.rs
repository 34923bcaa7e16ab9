//! Job status API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use dashpack_core::{Job, JobId, JobStatus};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

/// Response for job status queries
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status(),
            message: job.message,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Get the current status of a job
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let not_found = || error_response(StatusCode::NOT_FOUND, "Job not found");

    let job_id = JobId::parse(&job_id).ok_or_else(not_found)?;
    let job = state
        .coordinator()
        .query_status(&job_id)
        .map_err(|_| not_found())?;

    Ok(Json(job.into()))
}
