//! Field-level merge policy and the sparse partial-update builder.
//!
//! Every field of [`ResearchState`] is listed in [`StateField`] with exactly one
//! [`MergePolicy`]. Stages never touch the record directly; they return a
//! [`StateUpdate`] naming only the fields they changed, and [`merge`] combines it
//! with the current record:
//!
//! | Policy      | Effect                                             |
//! |-------------|----------------------------------------------------|
//! | `Overwrite` | the update's value replaces the field              |
//! | `Append`    | the update's sequence is appended, order preserved |
//!
//! `topic` and `max_iterations` are set once at construction and cannot appear
//! in an update at all.

use serde::Serialize;

use super::{ResearchState, SearchResult, Source, StepTag};

/// How a field combines with an incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    Overwrite,
    Append,
}

/// The closed set of State Record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Topic,
    PlanSummary,
    SearchQueries,
    SearchResults,
    GatheredInfo,
    Sources,
    DraftReport,
    FinalReport,
    ReviewFeedback,
    NeedsRevision,
    IterationCount,
    MaxIterations,
    CurrentStep,
    Errors,
}

impl StateField {
    pub const ALL: [StateField; 14] = [
        StateField::Topic,
        StateField::PlanSummary,
        StateField::SearchQueries,
        StateField::SearchResults,
        StateField::GatheredInfo,
        StateField::Sources,
        StateField::DraftReport,
        StateField::FinalReport,
        StateField::ReviewFeedback,
        StateField::NeedsRevision,
        StateField::IterationCount,
        StateField::MaxIterations,
        StateField::CurrentStep,
        StateField::Errors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StateField::Topic => "topic",
            StateField::PlanSummary => "plan_summary",
            StateField::SearchQueries => "search_queries",
            StateField::SearchResults => "search_results",
            StateField::GatheredInfo => "gathered_info",
            StateField::Sources => "sources",
            StateField::DraftReport => "draft_report",
            StateField::FinalReport => "final_report",
            StateField::ReviewFeedback => "review_feedback",
            StateField::NeedsRevision => "needs_revision",
            StateField::IterationCount => "iteration_count",
            StateField::MaxIterations => "max_iterations",
            StateField::CurrentStep => "current_step",
            StateField::Errors => "errors",
        }
    }

    pub fn policy(&self) -> MergePolicy {
        match self {
            StateField::SearchQueries
            | StateField::SearchResults
            | StateField::GatheredInfo
            | StateField::Sources
            | StateField::Errors => MergePolicy::Append,
            _ => MergePolicy::Overwrite,
        }
    }

    /// Fields fixed when the record is created.
    pub fn is_immutable(&self) -> bool {
        matches!(self, StateField::Topic | StateField::MaxIterations)
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A sparse set of field assignments returned by a stage.
///
/// Absent fields are left untouched by the merge. Sequence builders
/// accumulate, so calling `error` twice yields two appended entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    plan_summary: Option<Option<String>>,
    search_queries: Option<Vec<String>>,
    search_results: Option<Vec<SearchResult>>,
    gathered_info: Option<Vec<String>>,
    sources: Option<Vec<Source>>,
    draft_report: Option<Option<String>>,
    final_report: Option<Option<String>>,
    review_feedback: Option<Option<String>>,
    needs_revision: Option<bool>,
    iteration_count: Option<u32>,
    current_step: Option<StepTag>,
    errors: Option<Vec<String>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_summary(mut self, summary: impl Into<String>) -> Self {
        self.plan_summary = Some(Some(summary.into()));
        self
    }

    pub fn search_queries(mut self, queries: Vec<String>) -> Self {
        self.search_queries.get_or_insert_with(Vec::new).extend(queries);
        self
    }

    pub fn search_results(mut self, results: Vec<SearchResult>) -> Self {
        self.search_results.get_or_insert_with(Vec::new).extend(results);
        self
    }

    pub fn gathered_info(mut self, info: Vec<String>) -> Self {
        self.gathered_info.get_or_insert_with(Vec::new).extend(info);
        self
    }

    pub fn sources(mut self, sources: Vec<Source>) -> Self {
        self.sources.get_or_insert_with(Vec::new).extend(sources);
        self
    }

    pub fn draft_report(mut self, report: impl Into<String>) -> Self {
        self.draft_report = Some(Some(report.into()));
        self
    }

    pub fn final_report(mut self, report: impl Into<String>) -> Self {
        self.final_report = Some(Some(report.into()));
        self
    }

    pub fn review_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.review_feedback = Some(Some(feedback.into()));
        self
    }

    pub fn needs_revision(mut self, needs_revision: bool) -> Self {
        self.needs_revision = Some(needs_revision);
        self
    }

    pub fn iteration_count(mut self, count: u32) -> Self {
        self.iteration_count = Some(count);
        self
    }

    pub fn current_step(mut self, step: StepTag) -> Self {
        self.current_step = Some(step);
        self
    }

    /// Append one diagnostic to `errors`.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(message.into());
        self
    }

    pub fn errors(mut self, messages: Vec<String>) -> Self {
        self.errors.get_or_insert_with(Vec::new).extend(messages);
        self
    }

    /// The fields this update assigns, in declaration order.
    pub fn touched_fields(&self) -> Vec<StateField> {
        let present = [
            (StateField::PlanSummary, self.plan_summary.is_some()),
            (StateField::SearchQueries, self.search_queries.is_some()),
            (StateField::SearchResults, self.search_results.is_some()),
            (StateField::GatheredInfo, self.gathered_info.is_some()),
            (StateField::Sources, self.sources.is_some()),
            (StateField::DraftReport, self.draft_report.is_some()),
            (StateField::FinalReport, self.final_report.is_some()),
            (StateField::ReviewFeedback, self.review_feedback.is_some()),
            (StateField::NeedsRevision, self.needs_revision.is_some()),
            (StateField::IterationCount, self.iteration_count.is_some()),
            (StateField::CurrentStep, self.current_step.is_some()),
            (StateField::Errors, self.errors.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(field, set)| set.then_some(field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    pub(super) fn apply_to(self, state: &mut ResearchState) {
        assign(&mut state.plan_summary, self.plan_summary);
        combine(StateField::SearchQueries, &mut state.search_queries, self.search_queries);
        combine(StateField::SearchResults, &mut state.search_results, self.search_results);
        combine(StateField::GatheredInfo, &mut state.gathered_info, self.gathered_info);
        combine(StateField::Sources, &mut state.sources, self.sources);
        assign(&mut state.draft_report, self.draft_report);
        assign(&mut state.final_report, self.final_report);
        assign(&mut state.review_feedback, self.review_feedback);
        assign(&mut state.needs_revision, self.needs_revision);
        assign(&mut state.iteration_count, self.iteration_count);
        assign(&mut state.current_step, self.current_step);
        combine(StateField::Errors, &mut state.errors, self.errors);
    }
}

fn assign<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn combine<T>(field: StateField, target: &mut Vec<T>, value: Option<Vec<T>>) {
    let Some(value) = value else {
        return;
    };
    match field.policy() {
        MergePolicy::Append => target.extend(value),
        MergePolicy::Overwrite => *target = value,
    }
}

/// Pure merge: returns a new record with `update` applied to a copy of `state`.
pub fn merge(state: &ResearchState, update: StateUpdate) -> ResearchState {
    let mut next = state.clone();
    update.apply_to(&mut next);
    next
}
