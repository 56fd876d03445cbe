// src/pipeline/concat.rs
//! Final assembly of synchronized shots into one deliverable.

use crate::error::{PipelineError, PipelineResult};
use crate::toolkit::MediaToolkit;
use crate::types::{Canvas, CompositeClip, FinalArtifact, ShotOutcome};
use crate::utils::ScratchFiles;
use crate::workspace::{storage_name, Area, RunWorkspace, Workspace};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Concatenator {
    toolkit: Arc<dyn MediaToolkit>,
    workspace: Workspace,
}

fn concat_error(step: &str, reason: impl std::fmt::Display) -> PipelineError {
    PipelineError::Concatenation(format!("{}: {}", step, reason))
}

impl Concatenator {
    pub fn new(toolkit: Arc<dyn MediaToolkit>, workspace: Workspace) -> Self {
        Self { toolkit, workspace }
    }

    /// Join every synchronized shot in index order, bind the narration track
    /// and publish `final/<story_id>.mp4`.
    ///
    /// Skipped shots are left out of both tracks so audio stays aligned with
    /// the video timeline. Nothing is published unless every step succeeds,
    /// and intermediate files are removed on every exit path.
    pub async fn concatenate(
        &self,
        outcomes: &[ShotOutcome],
        run: &RunWorkspace,
        story_id: &str,
    ) -> PipelineResult<FinalArtifact> {
        let mut clips: Vec<&CompositeClip> = outcomes.iter().filter_map(ShotOutcome::clip).collect();
        clips.sort_by_key(|clip| clip.index);

        let mut skipped_shots = Vec::new();
        for outcome in outcomes {
            if let ShotOutcome::Skipped { reason, .. } = outcome {
                tracing::warn!(
                    index = outcome.index(),
                    reason = %reason,
                    "Shot left out of the final cut"
                );
                skipped_shots.push(outcome.index());
            }
        }
        skipped_shots.sort_unstable();

        if clips.is_empty() {
            return Err(PipelineError::Concatenation(
                "no synchronized shots to concatenate".to_string(),
            ));
        }
        self.check_synced_area(&clips, run).await?;

        let mut infos = Vec::with_capacity(clips.len());
        for clip in &clips {
            let info = self
                .toolkit
                .probe(&clip.video)
                .await
                .map_err(|e| concat_error(&format!("shot {}", clip.index), e))?;
            infos.push(info);
        }
        let canvas = Canvas::covering(&infos)
            .ok_or_else(|| concat_error("canvas", "clips report no frame size"))?;

        let video_inputs: Vec<PathBuf> = clips.iter().map(|clip| clip.video.clone()).collect();
        let audio_inputs: Vec<PathBuf> = clips
            .iter()
            .map(|clip| {
                clip.audio
                    .clone()
                    .ok_or_else(|| concat_error(&format!("shot {}", clip.index), "no narration track"))
            })
            .collect::<PipelineResult<_>>()?;

        let mut scratch = ScratchFiles::new();
        let video_track = scratch.track(run.scratch_path("timeline_video.mp4"));
        let audio_track = scratch.track(run.scratch_path("timeline_audio.wav"));
        let staged = scratch.track(
            run.scratch_path(&format!("{}.staged.mp4", storage_name(story_id))),
        );

        tracing::info!(
            clips = clips.len(),
            skipped = skipped_shots.len(),
            width = canvas.width,
            height = canvas.height,
            "🎞️ Concatenating timeline"
        );

        self.toolkit
            .concat_videos(&video_inputs, &canvas, &video_track)
            .await
            .map_err(|e| concat_error("video track", e))?;
        self.toolkit
            .concat_audio(&audio_inputs, &audio_track)
            .await
            .map_err(|e| concat_error("audio track", e))?;
        self.toolkit
            .bind_audio(&video_track, &audio_track, &staged)
            .await
            .map_err(|e| concat_error("audio binding", e))?;

        let duration_seconds = self
            .toolkit
            .probe(&staged)
            .await
            .map_err(|e| concat_error("final probe", e))?
            .duration_seconds;

        let path = self
            .workspace
            .publish(&staged, story_id)
            .await
            .map_err(|e| concat_error("publish", e))?;
        let reference = self
            .workspace
            .relative(&path)
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        tracing::info!(output = %path.display(), duration_seconds, "✅ Final video published");

        Ok(FinalArtifact {
            path,
            reference,
            duration_seconds,
            skipped_shots,
        })
    }

    /// Every clip must be the `merged_<i>` artifact of its own index.
    async fn check_synced_area(
        &self,
        clips: &[&CompositeClip],
        run: &RunWorkspace,
    ) -> PipelineResult<()> {
        let present: HashMap<usize, PathBuf> = run
            .indexed_artifacts(Area::Synced)
            .await
            .map_err(|e| concat_error("synced area", e))?
            .into_iter()
            .collect();
        for clip in clips {
            if present.get(&clip.index) != Some(&clip.video) {
                return Err(concat_error(
                    &format!("shot {}", clip.index),
                    format!("{} is not in the synced area", clip.video.display()),
                ));
            }
        }
        Ok(())
    }
}
