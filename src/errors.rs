//! Typed error hierarchy for the research pipeline.
//!
//! Three top-level enums cover the three failure classes:
//! - `CollaboratorError`: a language-model or search call failed or timed out
//! - `ConfigurationError`: the stage graph or run inputs are malformed
//! - `PipelineError`: the orchestrator aborted a run

use std::time::Duration;

use thiserror::Error;

use crate::stages::StageName;
use crate::state::StateField;

/// Errors raised by external collaborators (language model, web search).
///
/// Stages never let these escape: every one is turned into a fallback value
/// and a diagnostic line in the state's `errors` list.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Request timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Collaborator not configured: {0}")]
    NotConfigured(String),
}

/// Setup defects. These fail fast when the graph is built or a run starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("max_iterations must be greater than zero, got {0}")]
    InvalidMaxIterations(i64),

    #[error("Stage {stage} wrote field '{field}' it did not declare")]
    UndeclaredField { stage: StageName, field: StateField },

    #[error("Stage {stage} declares a write to immutable field '{field}'")]
    ImmutableField { stage: StageName, field: StateField },

    #[error("Stage {0} is referenced by a transition but not registered")]
    MissingStage(StageName),

    #[error("Stage graph has no entry stage")]
    MissingEntry,

    #[error("Stage {0} is registered twice")]
    DuplicateStage(StageName),

    #[error("Transition from {from} back to {to} would re-enter a completed stage")]
    ForbiddenCycle { from: StageName, to: StageName },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Run exceeded the step limit of {limit} stage invocations")]
    StepLimitExceeded { limit: usize },
}
