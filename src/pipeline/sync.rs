// src/pipeline/sync.rs
//! Per-shot audio/video synchronization.
//!
//! The narration is authoritative: each shot's clip is trimmed or looped until
//! its length equals the narration length, then the narration is burnt in as a
//! caption. A shot that cannot be synchronized is skipped, never fatal.

use crate::error::PipelineError;
use crate::toolkit::MediaToolkit;
use crate::types::{Caption, CaptionStyle, CompositeClip, ShotMedia, ShotOutcome};
use crate::utils::ScratchFiles;
use crate::workspace::{Area, RunWorkspace};
use std::path::PathBuf;
use std::sync::Arc;

/// Durations closer than this are treated as equal.
pub const DURATION_EPSILON: f64 = 1e-3;

/// How a clip of length Dv is brought to narration length Da.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Da == Dv
    Unchanged,
    /// Da < Dv: keep `[0, duration)`.
    Trim { duration: f64 },
    /// Da > Dv: play the clip `repeats` times, then cut to `trim_to` if the
    /// loop overshoots.
    Loop {
        repeats: u32,
        looped_duration: f64,
        trim_to: Option<f64>,
    },
}

impl Reconciliation {
    /// Length of the reconciled clip.
    pub fn resulting_duration(&self, video: f64) -> f64 {
        match self {
            Reconciliation::Unchanged => video,
            Reconciliation::Trim { duration } => *duration,
            Reconciliation::Loop {
                looped_duration,
                trim_to,
                ..
            } => trim_to.unwrap_or(*looped_duration),
        }
    }
}

pub fn plan_reconciliation(audio: f64, video: f64) -> Result<Reconciliation, String> {
    if !video.is_finite() || video <= 0.0 {
        return Err(format!("video duration {} is not usable", video));
    }
    if !audio.is_finite() || audio <= 0.0 {
        return Err(format!("audio duration {} is not usable", audio));
    }

    if (audio - video).abs() <= DURATION_EPSILON {
        return Ok(Reconciliation::Unchanged);
    }
    if audio < video {
        return Ok(Reconciliation::Trim { duration: audio });
    }

    let repeats = (audio / video).ceil() as u32;
    let looped_duration = video * repeats as f64;
    let trim_to = (looped_duration - audio > DURATION_EPSILON).then_some(audio);
    Ok(Reconciliation::Loop {
        repeats,
        looped_duration,
        trim_to,
    })
}

pub struct MediaSynchronizer {
    toolkit: Arc<dyn MediaToolkit>,
    caption_style: CaptionStyle,
}

impl MediaSynchronizer {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, caption_style: CaptionStyle) -> Self {
        Self {
            toolkit,
            caption_style,
        }
    }

    /// One outcome per input shot, in input order. Composites land in the
    /// run's synced area as `merged_<index>.mp4`.
    pub async fn synchronize(&self, shots: &[ShotMedia], run: &RunWorkspace) -> Vec<ShotOutcome> {
        let mut outcomes = Vec::with_capacity(shots.len());

        for shot in shots {
            match self.synchronize_shot(shot, run).await {
                Ok(clip) => {
                    tracing::debug!(
                        index = shot.index,
                        duration_seconds = clip.duration_seconds,
                        "🔗 Shot synchronized"
                    );
                    outcomes.push(ShotOutcome::Synchronized(clip));
                }
                Err(e) => {
                    tracing::warn!(index = shot.index, error = %e, "⚠️ Skipping shot");
                    outcomes.push(ShotOutcome::Skipped {
                        index: shot.index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcomes
    }

    async fn synchronize_shot(
        &self,
        shot: &ShotMedia,
        run: &RunWorkspace,
    ) -> Result<CompositeClip, PipelineError> {
        let index = shot.index;
        let sync_error = |reason: String| PipelineError::Sync { index, reason };

        let video_info = self
            .toolkit
            .probe(&shot.video)
            .await
            .map_err(|e| sync_error(e.to_string()))?;
        if !video_info.has_video {
            return Err(sync_error(format!("{} has no video stream", shot.video.display())));
        }

        let audio_info = self
            .toolkit
            .probe(&shot.audio)
            .await
            .map_err(|e| sync_error(e.to_string()))?;
        if !audio_info.has_audio {
            return Err(sync_error(format!("{} has no audio stream", shot.audio.display())));
        }

        let audio_duration = audio_info
            .audio_duration_seconds
            .unwrap_or(audio_info.duration_seconds);
        let plan = plan_reconciliation(audio_duration, video_info.duration_seconds)
            .map_err(sync_error)?;

        tracing::debug!(index, ?plan, "Reconciling clip to narration");

        // Looped and trimmed intermediates only live until the caption pass.
        let mut scratch = ScratchFiles::new();
        let reconciled: PathBuf = match &plan {
            Reconciliation::Unchanged => shot.video.clone(),
            Reconciliation::Trim { duration } => {
                let trimmed = scratch.track(run.scratch_path(&format!("trim_{}.mp4", index)));
                self.toolkit
                    .trim(&shot.video, *duration, &trimmed)
                    .await
                    .map_err(|e| sync_error(e.to_string()))?;
                trimmed
            }
            Reconciliation::Loop {
                repeats, trim_to, ..
            } => {
                let looped = scratch.track(run.scratch_path(&format!("loop_{}.mp4", index)));
                self.toolkit
                    .repeat(&shot.video, *repeats, &looped)
                    .await
                    .map_err(|e| sync_error(e.to_string()))?;
                match trim_to {
                    Some(duration) => {
                        let trimmed =
                            scratch.track(run.scratch_path(&format!("trim_{}.mp4", index)));
                        self.toolkit
                            .trim(&looped, *duration, &trimmed)
                            .await
                            .map_err(|e| sync_error(e.to_string()))?;
                        trimmed
                    }
                    None => looped,
                }
            }
        };

        let duration_seconds = plan.resulting_duration(video_info.duration_seconds);
        let caption = Caption {
            text: shot.narration.clone(),
            duration_seconds,
            style: self.caption_style.clone(),
        };
        let output = run.artifact_path(Area::Synced, index);
        self.toolkit
            .overlay_caption(&reconciled, &caption, &output)
            .await
            .map_err(|e| sync_error(e.to_string()))?;

        Ok(CompositeClip {
            index,
            video: output,
            audio: Some(shot.audio.clone()),
            caption: shot.narration.clone(),
            duration_seconds,
        })
    }
}
