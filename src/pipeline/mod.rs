// src/pipeline/mod.rs
//! Story rendering: generation, per-shot synchronization, final assembly.

pub mod concat;
pub mod orchestrator;
pub mod sync;

pub use concat::Concatenator;
pub use orchestrator::{
    with_deadline, OrchestratorSettings, PipelineOrchestrator, PipelineStage, ProgressSink,
    RunContext, StoryRenderer,
};
pub use sync::{plan_reconciliation, MediaSynchronizer, Reconciliation};
