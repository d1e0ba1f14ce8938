//! Research stage: search every planned query and summarize the hits.
//!
//! Queries may run concurrently (`research_concurrency`), but results are
//! collected in query order, so `sources` and `gathered_info` always line up
//! with `search_queries`. A failed query never affects its siblings.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::prompts::{SUMMARIZER_SYSTEM_PROMPT, summarizer_prompt};
use super::{Attempt, Stage, StageName, StageOutcome, StageSettings, attempt};
use crate::llm::{LanguageModel, Prompt, PromptRole};
use crate::search::SearchProvider;
use crate::state::{ResearchState, SearchResult, Source, StateField, StateUpdate, StepTag};

/// Hits listed in a summary assembled without the model.
const FALLBACK_SUMMARY_HITS: usize = 3;

/// Everything one query contributes, kept in its own slot.
#[derive(Debug, Default)]
struct QueryOutcome {
    results: Vec<SearchResult>,
    sources: Vec<Source>,
    summary: Option<String>,
    errors: Vec<String>,
}

pub struct ResearchStage {
    search: Arc<dyn SearchProvider>,
    llm: Arc<dyn LanguageModel>,
    settings: Arc<StageSettings>,
}

impl ResearchStage {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        llm: Arc<dyn LanguageModel>,
        settings: Arc<StageSettings>,
    ) -> Self {
        Self {
            search,
            llm,
            settings,
        }
    }

    async fn research_query(&self, topic: &str, query: &str) -> QueryOutcome {
        let mut outcome = QueryOutcome::default();

        let cap = self.settings.max_results_per_query;
        let results: Vec<SearchResult> = match self.search.search(query, cap).await {
            Ok(results) => results.into_iter().take(cap).collect(),
            Err(err) => {
                warn!(query, error = %err, provider = self.search.name(), "search failed");
                outcome.errors.push(format!("search failed for '{query}': {err}"));
                return outcome;
            }
        };

        if results.is_empty() {
            return outcome;
        }

        outcome.sources = results.iter().map(|r| Source::from_result(r, query)).collect();

        let prompt = Prompt::new(
            SUMMARIZER_SYSTEM_PROMPT,
            summarizer_prompt(topic, query, &results, &self.settings.language),
            self.settings.summarize_temperature,
        );
        let reply = self.llm.complete(PromptRole::Summarizer, &prompt).await;
        let summary = match attempt(self.name(), "summarizing", reply) {
            Attempt::Ok(text) => text,
            Attempt::Fallback(reason) => {
                outcome
                    .errors
                    .push(format!("summary failed for '{query}': {reason}"));
                fallback_summary(&results)
            }
        };
        outcome.summary = Some(format!("### {query}\n\n{summary}"));
        outcome.results = results;
        outcome
    }
}

/// Bullet list of the top hits, used when the summarizer is unavailable.
pub fn fallback_summary(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(FALLBACK_SUMMARY_HITS)
        .map(|r| format!("- {} [source: {}]", r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> StageName {
        StageName::Research
    }

    fn writes(&self) -> &'static [StateField] {
        &[
            StateField::SearchResults,
            StateField::GatheredInfo,
            StateField::Sources,
            StateField::CurrentStep,
            StateField::Errors,
        ]
    }

    async fn run(&self, state: &ResearchState) -> StageOutcome {
        if state.search_queries.is_empty() {
            warn!("no search queries to research");
            return StageOutcome::new(
                StateUpdate::new().error("no search queries to research"),
                StepTag::ResearchFailed,
            );
        }

        let concurrency = self.settings.research_concurrency.max(1);
        let pending: Vec<_> = state
            .search_queries
            .iter()
            .map(|query| self.research_query(&state.topic, query))
            .collect();
        let outcomes: Vec<QueryOutcome> = stream::iter(pending).buffered(concurrency).collect().await;

        let mut results = Vec::new();
        let mut sources = Vec::new();
        let mut gathered = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            results.extend(outcome.results);
            sources.extend(outcome.sources);
            gathered.extend(outcome.summary);
            errors.extend(outcome.errors);
        }

        info!(
            queries = state.search_queries.len(),
            results = results.len(),
            failures = errors.len(),
            "research finished"
        );

        let mut update = StateUpdate::new()
            .search_results(results)
            .sources(sources)
            .gathered_info(gathered);
        if !errors.is_empty() {
            update = update.errors(errors);
        }
        StageOutcome::new(update, StepTag::ResearchComplete)
    }
}
