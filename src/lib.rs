pub mod config;
pub mod errors;
pub mod graph;
pub mod llm;
pub mod orchestrator;
pub mod report;
pub mod search;
pub mod sleuth_config;
pub mod stages;
pub mod state;
pub mod telemetry;
pub mod ui;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{CollaboratorError, ConfigurationError, PipelineError};
pub use orchestrator::{Orchestrator, RunOutcome, run_research};
pub use state::{ResearchState, StateUpdate};
