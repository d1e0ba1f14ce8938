use std::time::Duration;

use crate::graph::HaltReason;
use crate::stages::StageName;
use crate::state::ResearchState;

/// Progress callbacks fired by the orchestrator.
///
/// All methods default to no-ops. The CLI implements this with progress bars.
pub trait PipelineObserver: Send + Sync {
    fn on_stage_start(&self, _stage: StageName, _state: &ResearchState) {}

    /// Called after the stage's update has been merged.
    fn on_stage_finish(&self, _stage: StageName, _state: &ResearchState, _elapsed: Duration) {}

    fn on_halt(&self, _reason: HaltReason, _state: &ResearchState) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
