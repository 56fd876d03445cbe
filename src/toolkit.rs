// src/toolkit.rs
//! The decode/encode/concatenate capability the pipeline is written against.

use crate::error::MediaError;
use crate::types::{Canvas, Caption, MediaInfo};
use crate::utils::ScratchFiles;
use crate::{audio, visual};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError>;

    /// Keep `[0, duration)` of the clip.
    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> Result<(), MediaError>;

    /// Concatenate the clip with itself `repeats` times.
    async fn repeat(&self, input: &Path, repeats: u32, output: &Path) -> Result<(), MediaError>;

    async fn overlay_caption(
        &self,
        input: &Path,
        caption: &Caption,
        output: &Path,
    ) -> Result<(), MediaError>;

    /// Join clips in order on a common canvas; the result carries no audio.
    async fn concat_videos(
        &self,
        inputs: &[PathBuf],
        canvas: &Canvas,
        output: &Path,
    ) -> Result<(), MediaError>;

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError>;

    /// Attach `audio` as the only audio track of `video`.
    async fn bind_audio(&self, video: &Path, audio: &Path, output: &Path)
        -> Result<(), MediaError>;
}

/// [`MediaToolkit`] backed by the ffmpeg / ffprobe binaries on PATH.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    fps: u32,
}

impl FfmpegToolkit {
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new(24)
    }
}

fn sidecar(output: &Path, extension: &str) -> PathBuf {
    output.with_extension(extension)
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        crate::core::analyze_media(path).await
    }

    async fn trim(&self, input: &Path, duration: f64, output: &Path) -> Result<(), MediaError> {
        crate::core::trim_video(input, output, duration, self.fps).await
    }

    async fn repeat(&self, input: &Path, repeats: u32, output: &Path) -> Result<(), MediaError> {
        let mut scratch = ScratchFiles::new();
        let list_file = scratch.track(sidecar(output, "concat.txt"));
        crate::core::repeat_video(input, output, repeats, &list_file).await
    }

    async fn overlay_caption(
        &self,
        input: &Path,
        caption: &Caption,
        output: &Path,
    ) -> Result<(), MediaError> {
        let mut scratch = ScratchFiles::new();
        let text_file = scratch.track(sidecar(output, "caption.txt"));
        visual::add_caption(input, output, caption, &text_file, self.fps).await
    }

    async fn concat_videos(
        &self,
        inputs: &[PathBuf],
        canvas: &Canvas,
        output: &Path,
    ) -> Result<(), MediaError> {
        crate::core::concat_videos(inputs, output, canvas, self.fps).await
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        audio::concat_audio(inputs, output).await
    }

    async fn bind_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        audio::add_audio(video, audio, output).await
    }
}
