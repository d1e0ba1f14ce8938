//! Transition rules: what runs after each stage.
//!
//! The fixed topology is
//!
//! ```text
//! plan ──► research ──(≥3 results)──► write ──► review ──(revise, within budget)──┐
//!              │                        ▲                                     │
//!              └──(too few)──► halt     └─────────────────────────────────────┘
//! ```
//!
//! Review → Write is the only cycle. It is bounded by `iteration_count`, which
//! only Review increments and which never passes `max_iterations`.

pub mod builder;

use serde::Serialize;

use crate::stages::StageName;
use crate::state::{ResearchState, StepTag};

pub use builder::{StageGraph, StageGraphBuilder};

/// Results Research must produce before Write may run.
pub const MIN_SEARCH_RESULTS: usize = 3;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum HaltReason {
    /// Review accepted the draft.
    Accepted,
    /// Review still wanted changes but the revision budget is spent.
    RevisionBudgetExhausted,
    /// Research found too few results to write from.
    InsufficientEvidence { found: usize, required: usize },
    /// There were no queries to research.
    NoQueries,
    /// Review ran without a draft.
    NoDraft,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::Accepted => write!(f, "report accepted"),
            HaltReason::RevisionBudgetExhausted => write!(f, "revision budget exhausted"),
            HaltReason::InsufficientEvidence { found, required } => {
                write!(f, "insufficient evidence ({found} of {required} results)")
            }
            HaltReason::NoQueries => write!(f, "no search queries"),
            HaltReason::NoDraft => write!(f, "no draft to review"),
        }
    }
}

/// Outcome of a transition decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(StageName),
    Halt(HaltReason),
}

/// Decision attached to a stage, evaluated on the merged state after it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRule {
    /// Unconditionally continue.
    Always(StageName),
    /// Continue only if enough search results were gathered.
    EvidenceGate { min_results: usize, then: StageName },
    /// Go back to `revise` while a revision is wanted and budget remains.
    RevisionLoop { revise: StageName },
}

impl TransitionRule {
    /// The rule the fixed topology attaches to `stage`.
    pub fn standard(stage: StageName) -> Self {
        match stage {
            StageName::Plan => TransitionRule::Always(StageName::Research),
            StageName::Research => TransitionRule::EvidenceGate {
                min_results: MIN_SEARCH_RESULTS,
                then: StageName::Write,
            },
            StageName::Write => TransitionRule::Always(StageName::Review),
            StageName::Review => TransitionRule::RevisionLoop {
                revise: StageName::Write,
            },
        }
    }

    pub fn decide(&self, state: &ResearchState) -> Next {
        match *self {
            TransitionRule::Always(next) => Next::Stage(next),
            TransitionRule::EvidenceGate { min_results, then } => {
                let found = state.search_results.len();
                if found >= min_results {
                    Next::Stage(then)
                } else if state.current_step == StepTag::ResearchFailed {
                    Next::Halt(HaltReason::NoQueries)
                } else {
                    Next::Halt(HaltReason::InsufficientEvidence {
                        found,
                        required: min_results,
                    })
                }
            }
            TransitionRule::RevisionLoop { revise } => {
                if state.needs_revision && state.iteration_count < state.max_iterations {
                    Next::Stage(revise)
                } else if state.needs_revision {
                    Next::Halt(HaltReason::RevisionBudgetExhausted)
                } else if state.final_report.is_some() {
                    Next::Halt(HaltReason::Accepted)
                } else {
                    Next::Halt(HaltReason::NoDraft)
                }
            }
        }
    }

    /// The stage this rule can move to.
    pub fn target(&self) -> StageName {
        match *self {
            TransitionRule::Always(next) => next,
            TransitionRule::EvidenceGate { then, .. } => then,
            TransitionRule::RevisionLoop { revise } => revise,
        }
    }

    pub fn is_revision_loop(&self) -> bool {
        matches!(self, TransitionRule::RevisionLoop { .. })
    }
}

impl std::fmt::Display for TransitionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionRule::Always(next) => write!(f, "→ {next}"),
            TransitionRule::EvidenceGate { min_results, then } => {
                write!(f, "→ {then} if search_results ≥ {min_results}, else halt")
            }
            TransitionRule::RevisionLoop { revise } => write!(
                f,
                "→ {revise} if needs_revision and iteration_count < max_iterations, else halt"
            ),
        }
    }
}

/// Decide what follows `stage` in the fixed topology.
pub fn decide(stage: StageName, state: &ResearchState) -> Next {
    TransitionRule::standard(stage).decide(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SearchResult;

    fn state() -> ResearchState {
        ResearchState::new("X", 2).unwrap()
    }

    fn with_results(n: usize) -> ResearchState {
        let mut s = state();
        s.search_results = (0..n)
            .map(|i| SearchResult::new("t", format!("u{i}"), "c", 0.5))
            .collect();
        s.current_step = StepTag::ResearchComplete;
        s
    }

    #[test]
    fn test_plan_always_researches() {
        assert_eq!(decide(StageName::Plan, &state()), Next::Stage(StageName::Research));
    }

    #[test]
    fn test_research_gate() {
        assert_eq!(decide(StageName::Research, &with_results(3)), Next::Stage(StageName::Write));
        assert_eq!(decide(StageName::Research, &with_results(12)), Next::Stage(StageName::Write));
        assert_eq!(
            decide(StageName::Research, &with_results(2)),
            Next::Halt(HaltReason::InsufficientEvidence { found: 2, required: 3 })
        );
    }

    #[test]
    fn test_research_without_queries_halts_with_no_queries() {
        let mut s = state();
        s.current_step = StepTag::ResearchFailed;
        assert_eq!(decide(StageName::Research, &s), Next::Halt(HaltReason::NoQueries));
    }

    #[test]
    fn test_write_always_reviews() {
        assert_eq!(decide(StageName::Write, &state()), Next::Stage(StageName::Review));
    }

    #[test]
    fn test_review_revises_within_budget() {
        let mut s = state();
        s.needs_revision = true;
        s.iteration_count = 1;
        assert_eq!(decide(StageName::Review, &s), Next::Stage(StageName::Write));

        s.iteration_count = 2;
        assert_eq!(
            decide(StageName::Review, &s),
            Next::Halt(HaltReason::RevisionBudgetExhausted)
        );
    }

    #[test]
    fn test_review_accepts() {
        let mut s = state();
        s.final_report = Some("done".into());
        assert_eq!(decide(StageName::Review, &s), Next::Halt(HaltReason::Accepted));

        s.final_report = None;
        assert_eq!(decide(StageName::Review, &s), Next::Halt(HaltReason::NoDraft));
    }

    #[test]
    fn test_review_never_targets_plan_or_research() {
        for stage in StageName::ALL {
            let rule = TransitionRule::standard(stage);
            if matches!(stage, StageName::Write | StageName::Review) {
                assert!(!matches!(rule.target(), StageName::Plan | StageName::Research));
            }
        }
    }

    #[test]
    fn test_rule_display() {
        let gate = TransitionRule::standard(StageName::Research).to_string();
        assert!(gate.contains("search_results ≥ 3"));
        assert_eq!(TransitionRule::standard(StageName::Plan).to_string(), "→ research");
    }

    #[test]
    fn test_halt_reason_display() {
        let reason = HaltReason::InsufficientEvidence { found: 0, required: 3 };
        assert_eq!(reason.to_string(), "insufficient evidence (0 of 3 results)");
    }
}
