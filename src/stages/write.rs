//! Write stage: synthesize the draft report.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::info;

use super::prompts::{WRITER_SYSTEM_PROMPT, WriterContext, writer_prompt};
use super::{Attempt, Stage, StageName, StageOutcome, StageSettings, attempt};
use crate::llm::{LanguageModel, Prompt, PromptRole};
use crate::state::{ResearchState, Source, StateField, StateUpdate, StepTag};

/// Distinct sources by URL, first occurrence wins, capped to `cap`.
///
/// Sources without a URL cannot be cited and are skipped.
pub fn dedupe_sources(sources: &[Source], cap: usize) -> Vec<&Source> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter(|s| !s.url.is_empty())
        .filter(|s| seen.insert(s.url.as_str()))
        .take(cap)
        .collect()
}

fn format_sources(sources: &[&Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}\n    {}", i + 1, s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn metadata_block(topic: &str, author: &str) -> String {
    format!(
        "---\ntitle: {topic}\ndate: {}\nauthor: {author}\n---\n\n",
        Local::now().format("%Y-%m-%d %H:%M")
    )
}

pub struct WriteStage {
    llm: Arc<dyn LanguageModel>,
    settings: Arc<StageSettings>,
}

impl WriteStage {
    pub fn new(llm: Arc<dyn LanguageModel>, settings: Arc<StageSettings>) -> Self {
        Self { llm, settings }
    }

    /// Report assembled from the state alone.
    fn fallback_report(&self, state: &ResearchState, sources: &str, reason: &str) -> String {
        let mut report = metadata_block(&state.topic, &self.settings.author);
        report.push_str(&format!("# {}\n\n", state.topic));

        report.push_str("## Summary\n\n");
        report.push_str(
            state
                .plan_summary
                .as_deref()
                .unwrap_or("No research plan was available."),
        );

        report.push_str("\n\n## Findings\n\n");
        if state.gathered_info.is_empty() {
            report.push_str("No information was gathered.");
        } else {
            report.push_str(&state.gathered_info.join("\n\n"));
        }

        report.push_str("\n\n## References\n\n");
        report.push_str(if sources.is_empty() { "None." } else { sources });

        report.push_str(&format!(
            "\n\n> Note: this report was assembled without the language model ({reason})."
        ));
        report
    }
}

#[async_trait]
impl Stage for WriteStage {
    fn name(&self) -> StageName {
        StageName::Write
    }

    fn writes(&self) -> &'static [StateField] {
        &[StateField::DraftReport, StateField::CurrentStep, StateField::Errors]
    }

    async fn run(&self, state: &ResearchState) -> StageOutcome {
        let sources = dedupe_sources(&state.sources, self.settings.max_sources);
        let source_list = format_sources(&sources);

        let revision_feedback = if state.needs_revision {
            state.review_feedback.as_deref()
        } else {
            None
        };
        let prompt = Prompt::new(
            WRITER_SYSTEM_PROMPT,
            writer_prompt(&WriterContext {
                topic: &state.topic,
                plan_summary: state.plan_summary.as_deref(),
                queries: &state.search_queries,
                gathered_info: &state.gathered_info,
                sources: &source_list,
                revision_feedback,
                language: &self.settings.language,
            }),
            self.settings.write_temperature,
        );

        let reply = self.llm.complete(PromptRole::Writer, &prompt).await;
        let mut update = StateUpdate::new();
        let report = match attempt(self.name(), "writing", reply) {
            Attempt::Ok(body) => metadata_block(&state.topic, &self.settings.author) + &body,
            Attempt::Fallback(reason) => {
                update = update.error(format!("writing failed, assembled fallback report: {reason}"));
                self.fallback_report(state, &source_list, &reason)
            }
        };

        info!(
            chars = report.len(),
            sources = sources.len(),
            revision = state.iteration_count,
            "draft written"
        );
        StageOutcome::new(update.draft_report(report), StepTag::WritingComplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    fn source(url: &str) -> Source {
        Source {
            title: format!("title {url}"),
            url: url.to_string(),
            query: "q".to_string(),
        }
    }

    fn researched_state() -> ResearchState {
        let mut state = ResearchState::new("Rust", 2).unwrap();
        state.plan_summary = Some("## Research Plan\n\nplan body".into());
        state.search_queries = vec!["rust".into()];
        state.gathered_info = vec!["### rust\n\n- memory safe".into()];
        state.sources = vec![source("a"), source("b"), source("a")];
        state
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence_in_order() {
        let sources = vec![source("a"), source("b"), source("a")];
        let urls: Vec<_> = dedupe_sources(&sources, 20).iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
    }

    #[test]
    fn test_dedupe_caps_after_dedup() {
        let sources: Vec<_> = (0..30).map(|i| source(&format!("u{}", i % 25))).collect();
        let deduped = dedupe_sources(&sources, 20);
        assert_eq!(deduped.len(), 20);
        assert_eq!(deduped[0].url, "u0");
        assert_eq!(deduped[19].url, "u19");
    }

    #[test]
    fn test_dedupe_skips_empty_urls() {
        let sources = vec![source(""), source("a")];
        let deduped = dedupe_sources(&sources, 20);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn test_format_sources_numbering() {
        let sources = vec![source("a"), source("b")];
        let refs: Vec<_> = sources.iter().collect();
        assert_eq!(format_sources(&refs), "[1] title a\n    a\n[2] title b\n    b");
    }

    #[tokio::test]
    async fn test_model_report_gets_metadata_block() {
        let model = Arc::new(ScriptedModel::new().reply(PromptRole::Writer, "# Rust\n\nBody [1]"));
        let stage = WriteStage::new(model.clone(), Arc::new(StageSettings::default()));
        let state = researched_state();

        let outcome = stage.run(&state).await;
        assert_eq!(outcome.hint, StepTag::WritingComplete);
        let mut next = state.clone();
        next.apply(outcome.into_update());

        let draft = next.draft_report.unwrap();
        assert!(draft.starts_with("---\ntitle: Rust\n"));
        assert!(draft.contains("author: AI Research Agent"));
        assert!(draft.ends_with("# Rust\n\nBody [1]"));
        assert!(next.errors.is_empty());

        let prompt = &model.calls()[0].1;
        assert_eq!(prompt.temperature, 0.5);
        assert!(prompt.user.contains("[1] title a\n    a\n[2] title b\n    b"));
        assert!(!prompt.user.contains("[3]"));
    }

    #[tokio::test]
    async fn test_fallback_report_is_assembled_from_state() {
        let stage = WriteStage::new(Arc::new(ScriptedModel::new()), Arc::new(StageSettings::default()));
        let state = researched_state();

        let mut next = state.clone();
        next.apply(stage.run(&state).await.into_update());

        let draft = next.draft_report.unwrap();
        assert!(draft.contains("# Rust\n"));
        assert!(draft.contains("plan body"));
        assert!(draft.contains("- memory safe"));
        assert!(draft.contains("## References\n\n[1] title a"));
        assert!(draft.contains("> Note: this report was assembled without the language model"));
        assert_eq!(next.errors.len(), 1);
        assert!(next.errors[0].starts_with("writing failed"));
    }

    #[tokio::test]
    async fn test_revision_passes_review_feedback() {
        let model = Arc::new(ScriptedModel::new().reply(PromptRole::Writer, "v2"));
        let stage = WriteStage::new(model.clone(), Arc::new(StageSettings::default()));
        let mut state = researched_state();
        state.needs_revision = true;
        state.iteration_count = 1;
        state.review_feedback = Some("needs improvement: cite benchmarks".into());

        stage.run(&state).await;
        assert!(model.calls()[0].1.user.contains("cite benchmarks"));
    }
}
