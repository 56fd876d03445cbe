// lib.rs - Main library file that exports all modules
pub mod types;
pub mod error;
pub mod config;
pub mod core;
pub mod audio;
pub mod visual;
pub mod utils;
pub mod toolkit;
pub mod workspace;
pub mod speech_client; // 🎙️ Narration synthesis
pub mod animation_client; // 🎞️ Image-to-video generation
pub mod pipeline;
pub mod jobs;
pub mod handlers;
pub mod middleware;

// Re-export commonly used types for convenience
pub use types::*;
pub use error::{ConfigError, MediaError, PipelineError, PipelineResult};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
pub use workspace::{Area, RunWorkspace, Workspace};
pub use pipeline::{PipelineOrchestrator, StoryRenderer};
pub use jobs::{JobManager, JobState, SharedJobManager};
