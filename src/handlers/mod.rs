// src/handlers/mod.rs
pub mod jobs;
pub mod output;

use crate::config::AppConfig;
use crate::jobs::SharedJobManager;
use crate::workspace::Workspace;
use axum::{extract::Extension, response::Json, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub job_manager: SharedJobManager,
    pub workspace: Workspace,
    pub config: AppConfig,
}

/// Every route with request logging, CORS and shared state applied.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(jobs::job_routes())
        .merge(output::output_routes())
        .route("/api/status", get(api_status))
        .layer(axum::middleware::from_fn(
            crate::middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

// API Status endpoint
async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    use serde_json::json;

    let ffmpeg_status = match crate::utils::check_ffmpeg_available().await {
        Ok(()) => "available".to_string(),
        Err(e) => e,
    };
    let jobs = state.job_manager.list().await;
    let running = jobs.iter().filter(|job| !job.state.is_terminal()).count();

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "ffmpeg": ffmpeg_status,
            "speech_engine": state.config.speech_engine_url,
            "image_animator": state.config.animator_url,
        },
        "jobs": {
            "known": jobs.len(),
            "running": running,
        },
        "storage_root": state.workspace.root().display().to_string(),
        "endpoints": {
            "submit": "/api/jobs",
            "status": "/api/jobs/:job_id/status",
            "cancel": "/api/jobs/:job_id/cancel",
            "artifacts": "/artifacts/*path"
        }
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PipelineResult;
    use crate::jobs::JobManager;
    use crate::pipeline::{ProgressSink, RunContext, StoryRenderer};
    use crate::types::{FinalArtifact, Story};
    use async_trait::async_trait;
    use std::path::Path;

    struct ValidatingRenderer;

    #[async_trait]
    impl StoryRenderer for ValidatingRenderer {
        async fn render(
            &self,
            story: &Story,
            _run: &RunContext,
            _progress: &dyn ProgressSink,
        ) -> PipelineResult<FinalArtifact> {
            story.validate()?;
            Ok(FinalArtifact {
                path: format!("final/{}.mp4", story.story_id).into(),
                reference: format!("final/{}.mp4", story.story_id),
                duration_seconds: 2.0,
                skipped_shots: vec![],
            })
        }
    }

    pub(crate) fn test_state(root: &Path) -> Arc<AppState> {
        let workspace = Workspace::new(root);
        Arc::new(AppState {
            job_manager: Arc::new(JobManager::new(Arc::new(ValidatingRenderer), workspace.clone())),
            workspace,
            config: AppConfig::default(),
        })
    }
}
