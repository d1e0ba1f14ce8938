//! Review stage: score the draft and decide whether it needs another pass.
//!
//! The reviewer's reply is free text. It is mapped onto a 1-10 score either by
//! keyword markers or, in structured mode, by an explicit `score: N` / `N/10`
//! when the reply contains one. A score below [`ACCEPT_THRESHOLD`] asks for a
//! revision.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::prompts::{REVIEWER_SYSTEM_PROMPT, reviewer_prompt};
use super::{Attempt, Stage, StageName, StageOutcome, StageSettings, attempt};
use crate::llm::{LanguageModel, Prompt, PromptRole};
use crate::state::{ResearchState, StateField, StateUpdate, StepTag};

pub const ACCEPT_THRESHOLD: u8 = 6;

/// Score used when the reviewer cannot be reached. Accepts the draft.
pub const UNAVAILABLE_SCORE: u8 = 6;

const POSITIVE_SCORE: u8 = 9;
const IMPROVEMENT_SCORE: u8 = 5;
const NEUTRAL_SCORE: u8 = 7;

const POSITIVE_MARKERS: &[&str] = &["excellent", "outstanding", "우수", "훌륭"];
const IMPROVEMENT_MARKERS: &[&str] = &["needs improvement", "insufficient", "lacking", "개선", "부족"];

static EXPLICIT_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscore\s*[:=]?\s*(\d{1,2})\b|\b(\d{1,2})\s*/\s*10\b")
        .expect("score pattern is a valid static regex")
});

/// How reviewer text becomes a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Positive markers score 9, improvement markers 5, anything else 7.
    #[default]
    Keywords,
    /// An explicit numeric score wins; keywords otherwise.
    Structured,
}

impl std::fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringMode::Keywords => write!(f, "keywords"),
            ScoringMode::Structured => write!(f, "structured"),
        }
    }
}

fn keyword_score(feedback: &str) -> u8 {
    let lower = feedback.to_lowercase();
    if POSITIVE_MARKERS.iter().any(|m| lower.contains(m)) {
        POSITIVE_SCORE
    } else if IMPROVEMENT_MARKERS.iter().any(|m| lower.contains(m)) {
        IMPROVEMENT_SCORE
    } else {
        NEUTRAL_SCORE
    }
}

fn explicit_score(feedback: &str) -> Option<u8> {
    let caps = EXPLICIT_SCORE.captures(feedback)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    digits.as_str().parse::<u8>().ok().map(|n| n.clamp(1, 10))
}

/// Map reviewer feedback onto the 1-10 scale.
pub fn score_feedback(feedback: &str, mode: ScoringMode) -> u8 {
    match mode {
        ScoringMode::Keywords => keyword_score(feedback),
        ScoringMode::Structured => explicit_score(feedback).unwrap_or_else(|| keyword_score(feedback)),
    }
}

pub struct ReviewStage {
    llm: Arc<dyn LanguageModel>,
    settings: Arc<StageSettings>,
}

impl ReviewStage {
    pub fn new(llm: Arc<dyn LanguageModel>, settings: Arc<StageSettings>) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Stage for ReviewStage {
    fn name(&self) -> StageName {
        StageName::Review
    }

    fn writes(&self) -> &'static [StateField] {
        &[
            StateField::FinalReport,
            StateField::ReviewFeedback,
            StateField::NeedsRevision,
            StateField::IterationCount,
            StateField::CurrentStep,
            StateField::Errors,
        ]
    }

    async fn run(&self, state: &ResearchState) -> StageOutcome {
        let Some(draft) = state.draft_report.as_deref() else {
            return StageOutcome::new(
                StateUpdate::new()
                    .needs_revision(false)
                    .error("no draft report to review"),
                StepTag::ReviewComplete,
            );
        };

        let prompt = Prompt::new(
            REVIEWER_SYSTEM_PROMPT,
            reviewer_prompt(&state.topic, draft),
            self.settings.review_temperature,
        );
        let reply = self.llm.complete(PromptRole::Reviewer, &prompt).await;

        let mut update = StateUpdate::new();
        let (feedback, score) = match attempt(self.name(), "reviewing", reply) {
            Attempt::Ok(text) => {
                let score = score_feedback(&text, self.settings.scoring);
                (text, score)
            }
            Attempt::Fallback(reason) => {
                update = update.error(format!("review failed, accepting draft: {reason}"));
                (reason, UNAVAILABLE_SCORE)
            }
        };

        let accepted = score >= ACCEPT_THRESHOLD;
        info!(score, accepted, iteration = state.iteration_count, "draft reviewed");

        let update = update.review_feedback(feedback).needs_revision(!accepted);
        if accepted {
            StageOutcome::new(update.final_report(draft), StepTag::ReviewComplete)
        } else {
            let next_iteration = (state.iteration_count + 1).min(state.max_iterations);
            StageOutcome::new(update.iteration_count(next_iteration), StepTag::NeedsRevision)
        }
    }
}
