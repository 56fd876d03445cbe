// types.rs - Common data structures for all modules
use crate::error::PipelineError;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// A story submission: shots in timeline order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Story {
    #[serde(deserialize_with = "deserialize_story_id")]
    pub story_id: String,
    #[serde(default)]
    pub shots: Vec<Shot>,
}

/// One unit of the story. Missing fields deserialize as empty strings so that
/// validation, not parsing, rejects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Shot {
    #[serde(rename = "image_url", alias = "image_reference", default)]
    pub image_reference: String,
    #[serde(default)]
    pub narration: String,
    #[serde(rename = "transition", alias = "transition_hint", default)]
    pub transition_hint: String,
}

impl Shot {
    pub fn new(image_reference: &str, narration: &str, transition_hint: &str) -> Self {
        Self {
            image_reference: image_reference.to_string(),
            narration: narration.to_string(),
            transition_hint: transition_hint.to_string(),
        }
    }
}

impl Story {
    /// Checks the whole structure before any generation call is made.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.story_id.trim().is_empty() {
            return Err(PipelineError::Validation("story_id is empty".to_string()));
        }
        if self.shots.is_empty() {
            return Err(PipelineError::Validation("story has no shots".to_string()));
        }
        for (index, shot) in self.shots.iter().enumerate() {
            let missing: Vec<&str> = [
                ("image_url", &shot.image_reference),
                ("narration", &shot.narration),
                ("transition", &shot.transition_hint),
            ]
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

            if !missing.is_empty() {
                return Err(PipelineError::Validation(format!(
                    "shot {} is missing {}",
                    index,
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

// Upstream story ids are database integers; clients may send either form.
fn deserialize_story_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Narration audio produced for exactly one shot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioArtifact {
    pub index: usize,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

/// Animated clip produced for exactly one shot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoArtifact {
    pub index: usize,
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Inputs the synchronizer pairs up for one shot.
#[derive(Debug, Clone)]
pub struct ShotMedia {
    pub index: usize,
    pub video: PathBuf,
    pub audio: PathBuf,
    pub narration: String,
}

/// A shot's duration-reconciled video with its caption burnt in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeClip {
    pub index: usize,
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
    pub caption: String,
    pub duration_seconds: f64,
}

/// Per-shot result of synchronization.
#[derive(Debug, Clone, PartialEq)]
pub enum ShotOutcome {
    Synchronized(CompositeClip),
    Skipped { index: usize, reason: String },
}

impl ShotOutcome {
    pub fn index(&self) -> usize {
        match self {
            ShotOutcome::Synchronized(clip) => clip.index,
            ShotOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn clip(&self) -> Option<&CompositeClip> {
        match self {
            ShotOutcome::Synchronized(clip) => Some(clip),
            ShotOutcome::Skipped { .. } => None,
        }
    }
}

// Media metadata structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_video: bool,
    pub has_audio: bool,
    pub audio_duration_seconds: Option<f64>,
}

/// Target frame for normalizing clips of differing resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Smallest even-sized canvas that fits every clip.
    pub fn covering<'a>(infos: impl IntoIterator<Item = &'a MediaInfo>) -> Option<Self> {
        let (width, height) = infos
            .into_iter()
            .fold((0u32, 0u32), |(w, h), info| (w.max(info.width), h.max(info.height)));
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width: width + width % 2,
            height: height + height % 2,
        })
    }
}

/// Caption appearance; white text with a black outline by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    pub font_size: u32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 50,
            color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 2,
            font_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub duration_seconds: f64,
    pub style: CaptionStyle,
}

/// The published deliverable of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalArtifact {
    pub path: PathBuf,
    pub reference: String,
    pub duration_seconds: f64,
    pub skipped_shots: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_story_payload() {
        let story: Story = serde_json::from_str(
            r#"{"story_id": 42, "shots": [{"image_url": "u1", "narration": "hello", "transition": "cut"}]}"#,
        )
        .unwrap();
        assert_eq!(story.story_id, "42");
        assert_eq!(story.shots[0], Shot::new("u1", "hello", "cut"));
        assert!(story.validate().is_ok());
    }

    #[test]
    fn missing_narration_fails_validation_not_parsing() {
        let story: Story = serde_json::from_str(
            r#"{"story_id": "s1", "shots": [{"image_url": "u1", "transition": "cut"}]}"#,
        )
        .unwrap();
        let err = story.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(err.to_string().contains("narration"));
    }

    #[test]
    fn empty_story_is_rejected() {
        let story = Story {
            story_id: "s1".to_string(),
            shots: vec![],
        };
        assert!(matches!(story.validate(), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn whitespace_only_fields_are_missing() {
        let story = Story {
            story_id: "s1".to_string(),
            shots: vec![Shot::new("u1", "hi", "cut"), Shot::new("  ", "there", "")],
        };
        let message = story.validate().unwrap_err().to_string();
        assert!(message.contains("shot 1"));
        assert!(message.contains("image_url"));
        assert!(message.contains("transition"));
    }

    #[test]
    fn canvas_covers_largest_clip_with_even_sides() {
        let infos = vec![
            MediaInfo {
                width: 1024,
                height: 575,
                ..Default::default()
            },
            MediaInfo {
                width: 719,
                height: 1280,
                ..Default::default()
            },
        ];
        assert_eq!(
            Canvas::covering(&infos),
            Some(Canvas {
                width: 1024,
                height: 1280
            })
        );
        assert_eq!(Canvas::covering(&[MediaInfo::default()]), None);
    }
}
