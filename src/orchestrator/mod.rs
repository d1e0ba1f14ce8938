pub mod observer;
pub mod runner;

pub use observer::{NoopObserver, PipelineObserver};
pub use runner::{Orchestrator, RunOutcome, StepRecord, run_research};
