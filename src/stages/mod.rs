//! Pipeline stages.
//!
//! Each stage reads the current [`ResearchState`] and returns a [`StageOutcome`]:
//! the sparse update it wants merged plus the `current_step` tag it finished
//! with. Stages are infallible at the type level. Collaborator failures are
//! turned into fallback values through [`Attempt`] and recorded in `errors`.
//!
//! | Stage        | Collaborators           | Writes                                     |
//! |--------------|-------------------------|--------------------------------------------|
//! | [`PlanStage`]     | language model     | plan_summary, search_queries               |
//! | [`ResearchStage`] | search, language model | search_results, sources, gathered_info |
//! | [`WriteStage`]    | language model     | draft_report                               |
//! | [`ReviewStage`]   | language model     | final_report, review_feedback, needs_revision, iteration_count |

pub mod attempt;
pub mod plan;
pub mod prompts;
pub mod research;
pub mod review;
pub mod write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::{ResearchState, StateField, StateUpdate, StepTag};

pub use attempt::{Attempt, attempt};
pub use plan::{PlanStage, ResearchPlan};
pub use research::ResearchStage;
pub use review::{ReviewStage, ScoringMode, score_feedback};
pub use write::{WriteStage, dedupe_sources};

/// The four stage identities of the fixed topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Plan,
    Research,
    Write,
    Review,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::Plan,
        StageName::Research,
        StageName::Write,
        StageName::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Plan => "plan",
            StageName::Research => "research",
            StageName::Write => "write",
            StageName::Review => "review",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub update: StateUpdate,
    pub hint: StepTag,
}

impl StageOutcome {
    pub fn new(update: StateUpdate, hint: StepTag) -> Self {
        Self { update, hint }
    }

    /// The update with `current_step` set to the hint.
    pub fn into_update(self) -> StateUpdate {
        self.update.current_step(self.hint)
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Every field this stage may assign. Checked when the graph is built
    /// and again against each returned update.
    fn writes(&self) -> &'static [StateField];

    async fn run(&self, state: &ResearchState) -> StageOutcome;
}

/// Tunables shared by the four stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub plan_temperature: f32,
    pub summarize_temperature: f32,
    pub write_temperature: f32,
    pub review_temperature: f32,
    /// Cap on hits requested per search query.
    pub max_results_per_query: usize,
    /// Cap on de-duplicated sources cited by the writer.
    pub max_sources: usize,
    /// Queries researched concurrently. Output order never depends on it.
    pub research_concurrency: usize,
    pub scoring: ScoringMode,
    /// Language the report is written in.
    pub language: String,
    pub author: String,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            plan_temperature: 0.3,
            summarize_temperature: 0.3,
            write_temperature: 0.5,
            review_temperature: 0.2,
            max_results_per_query: 3,
            max_sources: 20,
            research_concurrency: 1,
            scoring: ScoringMode::default(),
            language: "English".to_string(),
            author: "AI Research Agent".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        let names: Vec<String> = StageName::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["plan", "research", "write", "review"]);
    }

    #[test]
    fn test_outcome_sets_current_step() {
        let outcome = StageOutcome::new(StateUpdate::new().error("x"), StepTag::ResearchFailed);
        let update = outcome.into_update();
        assert!(update.touched_fields().contains(&StateField::CurrentStep));

        let mut state = ResearchState::new("t", 1).unwrap();
        state.apply(update);
        assert_eq!(state.current_step, StepTag::ResearchFailed);
        assert_eq!(state.errors, vec!["x"]);
    }

    #[test]
    fn test_default_settings() {
        let settings = StageSettings::default();
        assert_eq!(settings.max_results_per_query, 3);
        assert_eq!(settings.max_sources, 20);
        assert_eq!(settings.research_concurrency, 1);
        assert_eq!(settings.scoring, ScoringMode::Keywords);
    }
}
