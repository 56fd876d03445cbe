// Shared in-process fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use story_video::animation_client::{ImageAnimator, ImageFetcher};
use story_video::error::{MediaError, PipelineError};
use story_video::jobs::{Job, JobManager};
use story_video::pipeline::{OrchestratorSettings, PipelineOrchestrator};
use story_video::speech_client::{ChunkedSpeechSynthesizer, SpeechChunk, SpeechEngine};
use story_video::toolkit::MediaToolkit;
use story_video::types::{Canvas, Caption, MediaInfo, Shot, Story, VideoArtifact};
use story_video::workspace::Workspace;

/// Sample rate of the fake speech engine.
pub const SPEECH_RATE: u32 = 1000;
/// Seconds of speech per narration character.
pub const SECONDS_PER_CHAR: f64 = 0.5;

/// Media files written by the fakes are JSON descriptions of their streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FakeMedia {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
    pub audio_duration: Option<f64>,
}

impl FakeMedia {
    pub fn video(duration: f64, width: u32, height: u32) -> Self {
        Self {
            duration,
            width,
            height,
            has_video: true,
            has_audio: false,
            audio_duration: None,
        }
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, serde_json::to_vec(self).unwrap()).unwrap();
    }

    pub fn read(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

pub fn narration_seconds(text: &str) -> f64 {
    text.chars().count() as f64 * SECONDS_PER_CHAR
}

// ============================================================================
// MEDIA TOOLKIT
// ============================================================================

/// `MediaToolkit` over JSON-described media. WAV files are probed with hound.
#[derive(Default)]
pub struct FakeToolkit {
    pub calls: Mutex<Vec<String>>,
    pub concatenated_videos: Mutex<Vec<PathBuf>>,
    pub concatenated_audio: Mutex<Vec<PathBuf>>,
    /// Operation name that fails when invoked, e.g. "bind_audio".
    pub fail_on: Mutex<Option<&'static str>>,
}

impl FakeToolkit {
    pub fn failing_on(operation: &'static str) -> Self {
        let toolkit = Self::default();
        *toolkit.fail_on.lock().unwrap() = Some(operation);
        toolkit
    }

    fn enter(&self, operation: &'static str, detail: String) -> Result<(), MediaError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, detail).trim_end().to_string());
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(MediaError::Failed {
                tool: "fake",
                stderr: format!("{} refused", operation),
            });
        }
        Ok(())
    }

    fn read_media(path: &Path) -> Result<FakeMedia, MediaError> {
        if let Ok(reader) = hound::WavReader::open(path) {
            let seconds = reader.duration() as f64 / reader.spec().sample_rate as f64;
            return Ok(FakeMedia {
                duration: seconds,
                width: 0,
                height: 0,
                has_video: false,
                has_audio: true,
                audio_duration: Some(seconds),
            });
        }
        FakeMedia::read(path).ok_or_else(|| MediaError::probe(path, "unreadable fake media"))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let media = Self::read_media(path)?;
        Ok(MediaInfo {
            duration_seconds: media.duration,
            width: media.width,
            height: media.height,
            fps: 24.0,
            has_video: media.has_video,
            has_audio: media.has_audio,
            audio_duration_seconds: media.audio_duration,
        })
    }

    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> Result<(), MediaError> {
        self.enter("trim", format!("{}", duration))?;
        let source = Self::read_media(input)?;
        FakeMedia {
            duration: duration.min(source.duration),
            has_audio: false,
            audio_duration: None,
            ..source
        }
        .write(output);
        Ok(())
    }

    async fn repeat(&self, input: &Path, repeats: u32, output: &Path) -> Result<(), MediaError> {
        self.enter("repeat", format!("{}", repeats))?;
        let source = Self::read_media(input)?;
        FakeMedia {
            duration: source.duration * repeats as f64,
            ..source
        }
        .write(output);
        Ok(())
    }

    async fn overlay_caption(
        &self,
        input: &Path,
        caption: &Caption,
        output: &Path,
    ) -> Result<(), MediaError> {
        self.enter("caption", caption.text.clone())?;
        Self::read_media(input)?.write(output);
        Ok(())
    }

    async fn concat_videos(
        &self,
        inputs: &[PathBuf],
        canvas: &Canvas,
        output: &Path,
    ) -> Result<(), MediaError> {
        self.enter("concat_videos", format!("{}x{}", canvas.width, canvas.height))?;
        *self.concatenated_videos.lock().unwrap() = inputs.to_vec();
        let mut duration = 0.0;
        for input in inputs {
            duration += Self::read_media(input)?.duration;
        }
        FakeMedia::video(duration, canvas.width, canvas.height).write(output);
        Ok(())
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        self.enter("concat_audio", String::new())?;
        *self.concatenated_audio.lock().unwrap() = inputs.to_vec();
        let mut duration = 0.0;
        for input in inputs {
            duration += Self::read_media(input)?.duration;
        }
        FakeMedia {
            duration,
            width: 0,
            height: 0,
            has_video: false,
            has_audio: true,
            audio_duration: Some(duration),
        }
        .write(output);
        Ok(())
    }

    async fn bind_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MediaError> {
        self.enter("bind_audio", String::new())?;
        let video = Self::read_media(video)?;
        let audio = Self::read_media(audio)?;
        FakeMedia {
            duration: video.duration.max(audio.duration),
            has_audio: true,
            audio_duration: Some(audio.duration),
            ..video
        }
        .write(output);
        Ok(())
    }
}

// ============================================================================
// GENERATION FAKES
// ============================================================================

/// Speaks every narration at `SECONDS_PER_CHAR`, split into two chunks.
#[derive(Default)]
pub struct FakeSpeechEngine {
    pub requests: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechEngine for FakeSpeechEngine {
    async fn synthesize_chunks(
        &self,
        text: &str,
        _speaker: &str,
    ) -> Result<Vec<SpeechChunk>, PipelineError> {
        self.requests.lock().unwrap().push(text.to_string());
        let total = (narration_seconds(text) * SPEECH_RATE as f64) as usize;
        let first = total / 2;
        Ok(vec![
            SpeechChunk {
                samples: vec![0.1; first],
                sample_rate: SPEECH_RATE,
            },
            SpeechChunk {
                samples: vec![-0.1; total - first],
                sample_rate: SPEECH_RATE,
            },
        ])
    }
}

/// Returns the reference itself as image bytes; references listed in
/// `unreachable` fail.
#[derive(Default)]
pub struct FakeFetcher {
    pub requests: Mutex<Vec<String>>,
    pub unreachable: HashSet<String>,
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PipelineError> {
        self.requests.lock().unwrap().push(reference.to_string());
        if self.unreachable.contains(reference) {
            return Err(PipelineError::fetch(reference, "HTTP 404"));
        }
        Ok(reference.as_bytes().to_vec())
    }
}

/// Writes a clip of exactly the requested duration. Odd indices come out
/// square so the canvas has to cover both shapes.
#[derive(Default)]
pub struct FakeAnimator {
    pub requests: Mutex<Vec<(usize, String, f64)>>,
    pub delay: Duration,
    /// Indices whose clip is written as garbage.
    pub corrupt: HashSet<usize>,
}

#[async_trait]
impl ImageAnimator for FakeAnimator {
    async fn animate(
        &self,
        index: usize,
        image: Vec<u8>,
        target_duration: f64,
        output: &Path,
    ) -> Result<VideoArtifact, PipelineError> {
        self.requests.lock().unwrap().push((
            index,
            String::from_utf8_lossy(&image).into_owned(),
            target_duration,
        ));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let (width, height) = if index % 2 == 0 { (640, 360) } else { (480, 480) };
        if self.corrupt.contains(&index) {
            std::fs::write(output, b"not a video").unwrap();
        } else {
            FakeMedia::video(target_duration, width, height).write(output);
        }
        Ok(VideoArtifact {
            index,
            path: output.to_path_buf(),
            duration_seconds: target_duration,
            fps: 24.0,
            width,
            height,
        })
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct Harness {
    pub workspace: Workspace,
    pub toolkit: Arc<FakeToolkit>,
    pub engine: Arc<FakeSpeechEngine>,
    pub fetcher: Arc<FakeFetcher>,
    pub animator: Arc<FakeAnimator>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub manager: Arc<JobManager>,
}

pub struct HarnessBuilder {
    root: PathBuf,
    toolkit: FakeToolkit,
    fetcher: FakeFetcher,
    animator: FakeAnimator,
    settings: OrchestratorSettings,
}

impl HarnessBuilder {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            toolkit: FakeToolkit::default(),
            fetcher: FakeFetcher::default(),
            animator: FakeAnimator::default(),
            settings: OrchestratorSettings {
                call_timeout: Duration::from_secs(5),
                ..OrchestratorSettings::default()
            },
        }
    }

    pub fn toolkit(mut self, toolkit: FakeToolkit) -> Self {
        self.toolkit = toolkit;
        self
    }

    pub fn unreachable(mut self, reference: &str) -> Self {
        self.fetcher.unreachable.insert(reference.to_string());
        self
    }

    pub fn animation_delay(mut self, delay: Duration) -> Self {
        self.animator.delay = delay;
        self
    }

    pub fn corrupt_clip(mut self, index: usize) -> Self {
        self.animator.corrupt.insert(index);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.settings.call_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let workspace = Workspace::new(self.root);
        let toolkit = Arc::new(self.toolkit);
        let engine = Arc::new(FakeSpeechEngine::default());
        let fetcher = Arc::new(self.fetcher);
        let animator = Arc::new(self.animator);

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            workspace.clone(),
            toolkit.clone(),
            Arc::new(ChunkedSpeechSynthesizer::new(engine.clone(), "narrator")),
            fetcher.clone(),
            animator.clone(),
            self.settings,
        ));
        let manager = Arc::new(JobManager::new(orchestrator.clone(), workspace.clone()));

        Harness {
            workspace,
            toolkit,
            engine,
            fetcher,
            animator,
            orchestrator,
            manager,
        }
    }
}

impl Harness {
    pub fn new(root: &Path) -> Self {
        HarnessBuilder::new(root).build()
    }

    pub fn speech_requests(&self) -> Vec<String> {
        self.engine.requests.lock().unwrap().clone()
    }

    pub fn fetch_requests(&self) -> Vec<String> {
        self.fetcher.requests.lock().unwrap().clone()
    }

    pub fn animation_requests(&self) -> Vec<(usize, String, f64)> {
        self.animator.requests.lock().unwrap().clone()
    }
}

pub fn story(story_id: &str, shots: &[(&str, &str, &str)]) -> Story {
    Story {
        story_id: story_id.to_string(),
        shots: shots
            .iter()
            .map(|(image, narration, transition)| Shot::new(image, narration, transition))
            .collect(),
    }
}

/// The two-shot story used throughout.
pub fn hello_world() -> Story {
    story("s1", &[("u1", "hello", "cut"), ("u2", "world", "fade")])
}

pub async fn wait_for_terminal(manager: &JobManager, job_id: &str) -> Job {
    for _ in 0..1000 {
        let job = manager.query(job_id).await.expect("job exists");
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} did not finish in time", job_id);
}
