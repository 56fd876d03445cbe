// src/jobs/mod.rs
//! Background job registry for story renders
//! One job per story id; each submission runs on its own task and is polled
//! through `query` or followed through `subscribe`.

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{PipelineStage, RunContext, StoryRenderer};
use crate::types::Story;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

pub mod story_job;

/// Unique identifier for a job (the story id)
pub type JobId = String;

const PROGRESS_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub output_reference: String,
    /// Whole seconds, rounded to nearest.
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub run_id: Uuid,
    pub state: JobState,
    pub progress: u8,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub shot_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Earlier runs of this id whose directories are still on disk.
    #[serde(skip)]
    pub superseded_runs: Vec<Uuid>,
}

impl Job {
    fn new(id: JobId, shot_count: usize) -> Self {
        Self {
            id,
            run_id: Uuid::new_v4(),
            state: JobState::Waiting,
            progress: 0,
            result: None,
            error: None,
            shot_count,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            superseded_runs: Vec::new(),
        }
    }

    /// Every run directory this entry is responsible for.
    fn run_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.superseded_runs
            .iter()
            .copied()
            .chain(std::iter::once(self.run_id))
    }
}

/// Broadcast on every state or progress change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub run_id: Uuid,
    pub state: JobState,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    fn from_job(job: &Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            run_id: job.run_id,
            state: job.state,
            progress: job.progress,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Control commands for a running job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    Cancel,
}

struct RunHandle {
    run_id: Uuid,
    control: mpsc::UnboundedSender<JobControl>,
}

/// Owns every job and starts their runs.
///
/// Lock order is `jobs` before `control_channels`. All writes coming from a
/// run carry its `run_id` and are dropped once that run has been superseded.
pub struct JobManager {
    jobs: RwLock<HashMap<JobId, Job>>,
    control_channels: RwLock<HashMap<JobId, RunHandle>>,
    progress_tx: broadcast::Sender<ProgressUpdate>,
    renderer: Arc<dyn StoryRenderer>,
    workspace: Workspace,
}

impl JobManager {
    pub fn new(renderer: Arc<dyn StoryRenderer>, workspace: Workspace) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            jobs: RwLock::new(HashMap::new()),
            control_channels: RwLock::new(HashMap::new()),
            progress_tx,
            renderer,
            workspace,
        }
    }

    pub(crate) fn renderer(&self) -> Arc<dyn StoryRenderer> {
        self.renderer.clone()
    }

    fn broadcast(&self, job: &Job, message: impl Into<String>) {
        // no receivers is fine
        let _ = self.progress_tx.send(ProgressUpdate::from_job(job, message));
    }

    /// Register the story as `waiting` and start it in the background.
    ///
    /// An existing job with the same id is overwritten and its run, if still
    /// going, is cancelled.
    pub async fn submit(self: &Arc<Self>, story: Story) -> JobId {
        let job_id = story.story_id.clone();
        let mut job = Job::new(job_id.clone(), story.shots.len());
        let run = RunContext {
            job_id: job_id.clone(),
            run_id: job.run_id,
        };
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        {
            let mut jobs = self.jobs.write().await;
            let mut channels = self.control_channels.write().await;

            if let Some(previous) = jobs.get(&job_id) {
                tracing::info!(
                    job_id = %job_id,
                    previous_run = %previous.run_id,
                    previous_state = previous.state.as_str(),
                    "♻️ Resubmission overwrites existing job"
                );
                job.superseded_runs = previous.run_ids().collect();
            }
            jobs.insert(job_id.clone(), job.clone());
            let handle = RunHandle {
                run_id: run.run_id,
                control: control_tx,
            };
            if let Some(superseded) = channels.insert(job_id.clone(), handle) {
                let _ = superseded.control.send(JobControl::Cancel);
            }
        }

        tracing::info!(job_id = %job_id, run_id = %run.run_id, shots = job.shot_count, "🎬 Created job");
        self.broadcast(&job, "job accepted");

        story_job::spawn_story_job(self.clone(), story, run, control_rx);
        job_id
    }

    pub async fn query(&self, job_id: &str) -> PipelineResult<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))
    }

    /// Snapshot of every job, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.progress_tx.subscribe()
    }

    /// Fail a non-terminal job with "job cancelled" and abort its run.
    /// Terminal jobs are left as they are.
    pub async fn cancel(&self, job_id: &str) -> PipelineResult<()> {
        let run_id = {
            let jobs = self.jobs.read().await;
            let job = jobs
                .get(job_id)
                .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))?;
            if job.state.is_terminal() {
                tracing::debug!(job_id = %job_id, state = job.state.as_str(), "Cancel ignored");
                return Ok(());
            }
            job.run_id
        };

        {
            let channels = self.control_channels.read().await;
            if let Some(handle) = channels.get(job_id).filter(|h| h.run_id == run_id) {
                let _ = handle.control.send(JobControl::Cancel);
            }
        }
        self.fail(job_id, run_id, &PipelineError::Cancelled).await;

        tracing::info!(job_id = %job_id, run_id = %run_id, "🛑 Job cancelled");
        Ok(())
    }

    /// Apply `change` to the job only while `run_id` is still its current run.
    async fn update_run<F>(&self, job_id: &str, run_id: Uuid, change: F) -> Option<Job>
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).filter(|job| job.run_id == run_id)?;
        change(job).then(|| job.clone())
    }

    async fn release_control(&self, job_id: &str, run_id: Uuid) {
        let mut channels = self.control_channels.write().await;
        if channels.get(job_id).map(|h| h.run_id) == Some(run_id) {
            channels.remove(job_id);
        }
    }

    /// `waiting -> processing`. False when the run is no longer current.
    pub(crate) async fn mark_processing(&self, job_id: &str, run_id: Uuid) -> bool {
        let updated = self
            .update_run(job_id, run_id, |job| {
                if job.state != JobState::Waiting {
                    return false;
                }
                job.state = JobState::Processing;
                job.progress = PipelineStage::Started.checkpoint();
                job.started_at = Some(Utc::now());
                true
            })
            .await;

        match updated {
            Some(job) => {
                self.broadcast(&job, PipelineStage::Started.describe());
                true
            }
            None => false,
        }
    }

    /// Move progress forward to the stage checkpoint; never backwards.
    pub(crate) async fn advance(&self, job_id: &str, run_id: Uuid, stage: PipelineStage) {
        let updated = self
            .update_run(job_id, run_id, |job| {
                let checkpoint = stage.checkpoint();
                if job.state != JobState::Processing || checkpoint <= job.progress {
                    return false;
                }
                job.progress = checkpoint;
                true
            })
            .await;

        if let Some(job) = updated {
            tracing::debug!(job_id = %job_id, progress = job.progress, "📊 {}", stage.describe());
            self.broadcast(&job, stage.describe());
        }
    }

    pub(crate) async fn complete(&self, job_id: &str, run_id: Uuid, result: JobResult) {
        let updated = self
            .update_run(job_id, run_id, |job| {
                if job.state != JobState::Processing {
                    return false;
                }
                job.state = JobState::Completed;
                job.progress = PipelineStage::Completed.checkpoint();
                job.result = Some(result);
                job.completed_at = Some(Utc::now());
                true
            })
            .await;

        if let Some(job) = updated {
            self.broadcast(&job, PipelineStage::Completed.describe());
        }
        self.release_control(job_id, run_id).await;
    }

    pub(crate) async fn fail(&self, job_id: &str, run_id: Uuid, error: &PipelineError) {
        let message = error.to_string();
        let updated = self
            .update_run(job_id, run_id, |job| {
                if job.state.is_terminal() {
                    return false;
                }
                job.state = JobState::Failed;
                job.error = Some(message.clone());
                job.completed_at = Some(Utc::now());
                true
            })
            .await;

        if let Some(job) = updated {
            self.broadcast(&job, message);
        }
        self.release_control(job_id, run_id).await;
    }

    /// Drop terminal jobs that finished more than `max_age` ago, together with
    /// their run directories. Returns how many were removed.
    pub async fn prune_finished(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let removed: Vec<Job> = {
            let mut jobs = self.jobs.write().await;
            let expired: Vec<JobId> = jobs
                .values()
                .filter(|job| job.state.is_terminal())
                .filter(|job| job.completed_at.map_or(false, |at| at < cutoff))
                .map(|job| job.id.clone())
                .collect();
            expired
                .iter()
                .filter_map(|job_id| jobs.remove(job_id))
                .collect()
        };

        // Only the runs owned by the removed entry; a resubmission of the
        // same id may already be writing into a fresh run directory.
        for job in &removed {
            for run_id in job.run_ids() {
                if let Err(e) = self.workspace.discard_run(&job.id, run_id).await {
                    tracing::warn!(job_id = %job.id, run_id = %run_id, error = %e, "Failed to remove run directory");
                }
            }
            tracing::debug!(job_id = %job.id, "🗑️ Pruned finished job");
        }
        removed.len()
    }
}

pub type SharedJobManager = Arc<JobManager>;
