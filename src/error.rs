// src/error.rs
//! Error taxonomy for the story-to-video pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the pipeline stages and the job registry.
///
/// Stage errors are caught at the orchestrator boundary and recorded on the
/// job as `failed`; only `Sync` is recovered locally by the synchronizer.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid story: {0}")]
    Validation(String),

    #[error("failed to fetch image `{reference}`: {reason}")]
    Fetch { reference: String, reason: String },

    #[error("{stage} generation failed: {reason}")]
    Generation { stage: &'static str, reason: String },

    #[error("shot {index} could not be synchronized: {reason}")]
    Sync { index: usize, reason: String },

    #[error("concatenation failed: {0}")]
    Concatenation(String),

    #[error("job `{0}` not found")]
    NotFound(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("job cancelled")]
    Cancelled,

    #[error("pipeline task failed: {0}")]
    TaskFailed(String),

    #[error("workspace i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn speech(reason: impl Into<String>) -> Self {
        Self::Generation {
            stage: "speech",
            reason: reason.into(),
        }
    }

    pub fn animation(reason: impl Into<String>) -> Self {
        Self::Generation {
            stage: "animation",
            reason: reason.into(),
        }
    }

    pub fn fetch(reference: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the decode/encode/concatenate capability (ffmpeg and friends).
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to execute {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} error: {stderr}")]
    Failed { tool: &'static str, stderr: String },

    #[error("cannot read media `{path}`: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("media i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn from_stderr(tool: &'static str, stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr);
        // ffmpeg prints its whole banner to stderr; the tail carries the cause
        let tail: Vec<&str> = text.trim().lines().rev().take(8).collect();
        let stderr = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        Self::Failed { tool, stderr }
    }

    pub fn probe(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: `{value}` ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_is_trimmed_to_its_tail() {
        let mut stderr = String::new();
        for i in 0..20 {
            stderr.push_str(&format!("line {}\n", i));
        }
        match MediaError::from_stderr("ffmpeg", stderr.as_bytes()) {
            MediaError::Failed { tool, stderr } => {
                assert_eq!(tool, "ffmpeg");
                assert!(stderr.starts_with("line 12"));
                assert!(stderr.ends_with("line 19"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn generation_errors_name_their_stage() {
        assert_eq!(
            PipelineError::speech("engine returned no chunks").to_string(),
            "speech generation failed: engine returned no chunks"
        );
        assert_eq!(
            PipelineError::fetch("http://x/img.png", "HTTP 404").to_string(),
            "failed to fetch image `http://x/img.png`: HTTP 404"
        );
    }
}
