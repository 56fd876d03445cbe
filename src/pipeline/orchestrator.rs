// src/pipeline/orchestrator.rs
//! Drives one story through every stage, strictly in sequence.

use super::concat::Concatenator;
use super::sync::MediaSynchronizer;
use crate::animation_client::{ImageAnimator, ImageFetcher};
use crate::error::{PipelineError, PipelineResult};
use crate::speech_client::SpeechSynthesizer;
use crate::toolkit::MediaToolkit;
use crate::types::{AudioArtifact, CaptionStyle, FinalArtifact, ShotMedia, Story, VideoArtifact};
use crate::workspace::{Area, ArtifactSequence, RunWorkspace, Workspace};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one execution of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub job_id: String,
    pub run_id: Uuid,
}

/// Progress checkpoints, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Started,
    AudioGenerated,
    VideoGenerated,
    Synchronized,
    Completed,
}

impl PipelineStage {
    pub fn checkpoint(self) -> u8 {
        match self {
            PipelineStage::Started => 25,
            PipelineStage::AudioGenerated => 50,
            PipelineStage::VideoGenerated => 75,
            PipelineStage::Synchronized => 90,
            PipelineStage::Completed => 100,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            PipelineStage::Started => "pipeline started",
            PipelineStage::AudioGenerated => "narration audio generated",
            PipelineStage::VideoGenerated => "shot videos generated",
            PipelineStage::Synchronized => "shots synchronized",
            PipelineStage::Completed => "final video published",
        }
    }
}

/// Receives stage completions from a running pipeline.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn stage_completed(&self, stage: PipelineStage);
}

/// Anything that turns a story into a published video.
#[async_trait]
pub trait StoryRenderer: Send + Sync {
    async fn render(
        &self,
        story: &Story,
        run: &RunContext,
        progress: &dyn ProgressSink,
    ) -> PipelineResult<FinalArtifact>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Length requested from the animator for every shot.
    pub shot_video_seconds: f64,
    /// Deadline for each external call.
    pub call_timeout: Duration,
    /// Prefix for output references; bare relative paths when unset.
    pub public_base_url: Option<String>,
    pub caption_style: CaptionStyle,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            shot_video_seconds: 10.0,
            call_timeout: Duration::from_secs(600),
            public_base_url: None,
            caption_style: CaptionStyle::default(),
        }
    }
}

/// Run `call` under `deadline`; expiry becomes [`PipelineError::Timeout`].
pub async fn with_deadline<T, F>(
    deadline: Duration,
    operation: impl Into<String>,
    call: F,
) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            operation: operation.into(),
            seconds: deadline.as_secs(),
        }),
    }
}

pub struct PipelineOrchestrator {
    speech: Arc<dyn SpeechSynthesizer>,
    fetcher: Arc<dyn ImageFetcher>,
    animator: Arc<dyn ImageAnimator>,
    synchronizer: MediaSynchronizer,
    concatenator: Concatenator,
    workspace: Workspace,
    settings: OrchestratorSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        workspace: Workspace,
        toolkit: Arc<dyn MediaToolkit>,
        speech: Arc<dyn SpeechSynthesizer>,
        fetcher: Arc<dyn ImageFetcher>,
        animator: Arc<dyn ImageAnimator>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            speech,
            fetcher,
            animator,
            synchronizer: MediaSynchronizer::new(toolkit.clone(), settings.caption_style.clone()),
            concatenator: Concatenator::new(toolkit, workspace.clone()),
            workspace,
            settings,
        }
    }

    fn output_reference(&self, relative: &str) -> String {
        match &self.settings.public_base_url {
            Some(base) => format!("{}/artifacts/{}", base.trim_end_matches('/'), relative),
            None => relative.to_string(),
        }
    }

    async fn generate_audio(
        &self,
        story: &Story,
        run: &RunWorkspace,
    ) -> PipelineResult<Vec<AudioArtifact>> {
        let mut sequence = ArtifactSequence::new();
        let mut artifacts = Vec::with_capacity(story.shots.len());

        for shot in &story.shots {
            let index = sequence.next_index();
            let output = run.artifact_path(Area::Audio, index);
            let artifact = with_deadline(
                self.settings.call_timeout,
                format!("speech synthesis for shot {}", index),
                self.speech.synthesize(index, &shot.narration, &output),
            )
            .await?;
            artifacts.push(artifact);
        }

        Ok(artifacts)
    }

    async fn generate_video(
        &self,
        story: &Story,
        run: &RunWorkspace,
    ) -> PipelineResult<Vec<VideoArtifact>> {
        let mut sequence = ArtifactSequence::new();
        let mut artifacts = Vec::with_capacity(story.shots.len());

        for shot in &story.shots {
            let index = sequence.next_index();
            let image = with_deadline(
                self.settings.call_timeout,
                format!("image fetch for shot {}", index),
                self.fetcher.fetch(&shot.image_reference),
            )
            .await?;

            let output = run.artifact_path(Area::Video, index);
            let artifact = with_deadline(
                self.settings.call_timeout,
                format!("animation for shot {}", index),
                self.animator
                    .animate(index, image, self.settings.shot_video_seconds, &output),
            )
            .await?;
            artifacts.push(artifact);
        }

        Ok(artifacts)
    }
}

#[async_trait]
impl StoryRenderer for PipelineOrchestrator {
    async fn render(
        &self,
        story: &Story,
        context: &RunContext,
        progress: &dyn ProgressSink,
    ) -> PipelineResult<FinalArtifact> {
        // Nothing external is touched before the story is known to be complete.
        story.validate()?;

        let run = self
            .workspace
            .open_run(&context.job_id, context.run_id)
            .await?;
        for area in Area::ALL {
            run.reset(area).await?;
        }

        tracing::info!(
            job_id = %context.job_id,
            run_id = %context.run_id,
            shots = story.shots.len(),
            "🎬 Rendering story"
        );

        let audio = self.generate_audio(story, &run).await?;
        progress.stage_completed(PipelineStage::AudioGenerated).await;

        let video = self.generate_video(story, &run).await?;
        progress.stage_completed(PipelineStage::VideoGenerated).await;

        let media: Vec<ShotMedia> = story
            .shots
            .iter()
            .zip(audio.iter().zip(video.iter()))
            .map(|(shot, (audio, video))| ShotMedia {
                index: video.index,
                video: video.path.clone(),
                audio: audio.path.clone(),
                narration: shot.narration.clone(),
            })
            .collect();
        let outcomes = self.synchronizer.synchronize(&media, &run).await;
        progress.stage_completed(PipelineStage::Synchronized).await;

        let mut artifact = self
            .concatenator
            .concatenate(&outcomes, &run, &story.story_id)
            .await?;
        artifact.reference = self.output_reference(&artifact.reference);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_increase_with_stage_order() {
        let stages = [
            PipelineStage::Started,
            PipelineStage::AudioGenerated,
            PipelineStage::VideoGenerated,
            PipelineStage::Synchronized,
            PipelineStage::Completed,
        ];
        let checkpoints: Vec<u8> = stages.iter().map(|s| s.checkpoint()).collect();
        assert_eq!(checkpoints, vec![25, 50, 75, 90, 100]);
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_timeout_error() {
        let result: PipelineResult<()> = with_deadline(
            Duration::from_millis(10),
            "animation for shot 0",
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;
        match result {
            Err(PipelineError::Timeout { operation, .. }) => {
                assert_eq!(operation, "animation for shot 0")
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn calls_within_deadline_pass_through() {
        let value = with_deadline(Duration::from_secs(1), "speech", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
