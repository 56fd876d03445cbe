// src/jobs/story_job.rs
//! Story render executor - runs the pipeline in background and reports
//! stage checkpoints back to the job registry

use super::{JobControl, JobManager, JobResult};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{PipelineStage, ProgressSink, RunContext};
use crate::types::{FinalArtifact, Story};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Forwards stage completions of one run to the registry.
struct JobProgress {
    manager: Arc<JobManager>,
    run: RunContext,
}

#[async_trait]
impl ProgressSink for JobProgress {
    async fn stage_completed(&self, stage: PipelineStage) {
        self.manager
            .advance(&self.run.job_id, self.run.run_id, stage)
            .await;
    }
}

/// One run of one story.
pub struct StoryJob {
    manager: Arc<JobManager>,
    story: Story,
    run: RunContext,
}

impl StoryJob {
    pub fn new(manager: Arc<JobManager>, story: Story, run: RunContext) -> Self {
        Self {
            manager,
            story,
            run,
        }
    }

    pub async fn execute(self, mut control_rx: mpsc::UnboundedReceiver<JobControl>) {
        let StoryJob {
            manager,
            story,
            run,
        } = self;
        let job_id = run.job_id.clone();
        let run_id = run.run_id;

        if !manager.mark_processing(&job_id, run_id).await {
            tracing::debug!(job_id = %job_id, run_id = %run_id, "Run superseded before start");
            return;
        }
        tracing::info!(job_id = %job_id, run_id = %run_id, "🚀 Starting story job");

        let renderer = manager.renderer();
        let sink = JobProgress {
            manager: manager.clone(),
            run: run.clone(),
        };
        let mut render_handle =
            tokio::spawn(async move { renderer.render(&story, &sink.run, &sink).await });

        let outcome: PipelineResult<FinalArtifact> = tokio::select! {
            result = &mut render_handle => flatten(result),
            control = control_rx.recv() => match control {
                Some(JobControl::Cancel) => {
                    tracing::info!(job_id = %job_id, run_id = %run_id, "🛑 Aborting pipeline");
                    render_handle.abort();
                    Err(PipelineError::Cancelled)
                }
                // registry dropped the handle; nothing can cancel us anymore
                None => flatten(render_handle.await),
            },
        };

        match outcome {
            Ok(artifact) => {
                tracing::info!(
                    job_id = %job_id,
                    run_id = %run_id,
                    output = %artifact.reference,
                    duration_seconds = artifact.duration_seconds,
                    skipped = ?artifact.skipped_shots,
                    "✅ Story job completed"
                );
                let result = JobResult {
                    output_reference: artifact.reference,
                    duration: artifact.duration_seconds.max(0.0).round() as u64,
                };
                manager.complete(&job_id, run_id, result).await;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, run_id = %run_id, error = %e, "❌ Story job failed");
                manager.fail(&job_id, run_id, &e).await;
            }
        }
    }
}

fn flatten(
    joined: Result<PipelineResult<FinalArtifact>, tokio::task::JoinError>,
) -> PipelineResult<FinalArtifact> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(PipelineError::Cancelled),
        Err(e) => Err(PipelineError::TaskFailed(e.to_string())),
    }
}

/// Spawn a story job on its own task.
pub fn spawn_story_job(
    manager: Arc<JobManager>,
    story: Story,
    run: RunContext,
    control_rx: mpsc::UnboundedReceiver<JobControl>,
) -> JoinHandle<()> {
    let job = StoryJob::new(manager, story, run);
    tokio::spawn(job.execute(control_rx))
}
