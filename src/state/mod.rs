//! The State Record threaded through every pipeline stage.
//!
//! A [`ResearchState`] is created once per run from a topic and a revision
//! budget, owned by the orchestrator for the whole run, and only ever changed
//! by merging a [`StateUpdate`] into it. Field-level merge policies live in
//! [`update`].

pub mod update;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

pub use update::{MergePolicy, StateField, StateUpdate, merge};

/// One raw hit returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        score: f64,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            score,
        }
    }
}

/// A citation: where a search result came from and which query found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub query: String,
}

impl Source {
    /// Build the citation for a result found by `query`.
    pub fn from_result(result: &SearchResult, query: &str) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
            query: query.to_string(),
        }
    }
}

/// Tag written to `current_step` by each stage when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTag {
    #[default]
    Start,
    PlanningComplete,
    ResearchComplete,
    ResearchFailed,
    WritingComplete,
    ReviewComplete,
    NeedsRevision,
}

impl StepTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepTag::Start => "start",
            StepTag::PlanningComplete => "planning_complete",
            StepTag::ResearchComplete => "research_complete",
            StepTag::ResearchFailed => "research_failed",
            StepTag::WritingComplete => "writing_complete",
            StepTag::ReviewComplete => "review_complete",
            StepTag::NeedsRevision => "needs_revision",
        }
    }
}

impl std::fmt::Display for StepTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller got out of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// Review accepted a draft; `final_report` is set.
    Accepted,
    /// A draft exists but was never accepted.
    Draft,
    /// Neither report was produced.
    NoReport,
}

/// The accumulating context for one research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub plan_summary: Option<String>,
    pub search_queries: Vec<String>,
    pub search_results: Vec<SearchResult>,
    pub gathered_info: Vec<String>,
    pub sources: Vec<Source>,
    pub draft_report: Option<String>,
    pub final_report: Option<String>,
    pub review_feedback: Option<String>,
    pub needs_revision: bool,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub current_step: StepTag,
    pub errors: Vec<String>,
}

impl ResearchState {
    /// Create the initial record for a run.
    ///
    /// Rejects a revision budget of zero or less; the budget is immutable for
    /// the rest of the run.
    pub fn new(topic: impl Into<String>, max_iterations: i64) -> Result<Self, ConfigurationError> {
        let max_iterations = u32::try_from(max_iterations)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigurationError::InvalidMaxIterations(max_iterations))?;

        Ok(Self {
            topic: topic.into(),
            plan_summary: None,
            search_queries: Vec::new(),
            search_results: Vec::new(),
            gathered_info: Vec::new(),
            sources: Vec::new(),
            draft_report: None,
            final_report: None,
            review_feedback: None,
            needs_revision: false,
            iteration_count: 0,
            max_iterations,
            current_step: StepTag::Start,
            errors: Vec::new(),
        })
    }

    /// Merge `update` into this record in place, following each field's policy.
    pub fn apply(&mut self, update: StateUpdate) {
        update.apply_to(self);
    }

    pub fn report_status(&self) -> ReportStatus {
        if self.final_report.is_some() {
            ReportStatus::Accepted
        } else if self.draft_report.is_some() {
            ReportStatus::Draft
        } else {
            ReportStatus::NoReport
        }
    }

    /// The accepted report if there is one, else the latest draft.
    pub fn best_report(&self) -> Option<&str> {
        self.final_report
            .as_deref()
            .or(self.draft_report.as_deref())
    }
}
