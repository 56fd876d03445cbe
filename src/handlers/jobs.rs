// src/handlers/jobs.rs
//! Job endpoints - submit, status, cancel, list

use crate::error::PipelineError;
use crate::handlers::AppState;
use crate::jobs::{Job, JobId, JobState};
use crate::types::Story;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize, Debug)]
pub struct SubmitResponse {
    pub task_id: JobId,
    pub status: &'static str,
    pub check_url: String,
}

#[derive(Serialize, Debug)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.state,
            progress: job.progress,
            video_url: job.result.as_ref().map(|r| r.output_reference.clone()),
            duration: job.result.as_ref().map(|r| r.duration),
            error: job.error.clone(),
        }
    }
}

fn not_found(job_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("Job {} not found", job_id) })),
    )
        .into_response()
}

/// POST /api/jobs - Accept a story and start rendering it
pub async fn submit_job(
    Extension(state): Extension<Arc<AppState>>,
    Json(story): Json<Story>,
) -> impl IntoResponse {
    let job_id = state.job_manager.submit(story).await;
    let response = SubmitResponse {
        check_url: format!("/api/jobs/{}/status", urlencoding::encode(&job_id)),
        task_id: job_id,
        status: "accepted",
    };
    (StatusCode::ACCEPTED, Json(response))
}

/// GET /api/jobs/:job_id/status - Get job status
pub async fn get_job_status(
    Path(job_id): Path<JobId>,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    match state.job_manager.query(&job_id).await {
        Ok(job) => (StatusCode::OK, Json(JobStatusResponse::from(&job))).into_response(),
        Err(_) => not_found(&job_id),
    }
}

/// POST /api/jobs/:job_id/cancel - Cancel a running job
pub async fn cancel_job(
    Path(job_id): Path<JobId>,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    match state.job_manager.cancel(&job_id).await {
        Ok(()) => {
            let message = format!("Job {} cancel requested", job_id);
            tracing::info!("{}", message);
            (StatusCode::OK, Json(serde_json::json!({ "message": message }))).into_response()
        }
        Err(PipelineError::NotFound(_)) => not_found(&job_id),
        Err(e) => {
            tracing::error!("Failed to cancel job {}: {}", job_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/jobs - All known jobs
pub async fn list_jobs(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let jobs = state.job_manager.list().await;
    let response = serde_json::json!({
        "job_count": jobs.len(),
        "jobs": jobs.iter().map(|job| serde_json::json!({
            "id": job.id,
            "status": job.state,
            "progress": job.progress,
            "shots": job.shot_count,
            "created_at": job.created_at,
            "started_at": job.started_at,
            "completed_at": job.completed_at,
        })).collect::<Vec<_>>()
    });
    (StatusCode::OK, Json(response))
}

/// Routes for job management
pub fn job_routes() -> Router {
    Router::new()
        .route("/api/jobs", post(submit_job).get(list_jobs))
        .route("/api/jobs/:job_id/status", get(get_job_status))
        .route("/api/jobs/:job_id/cancel", post(cancel_job))
}
