//! Plan stage: turn a topic into a research plan and search queries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::prompts::{PLANNER_SYSTEM_PROMPT, planner_prompt};
use super::{Attempt, Stage, StageName, StageOutcome, StageSettings, attempt};
use crate::llm::{LanguageModel, Prompt, PromptRole};
use crate::state::{ResearchState, StateField, StateUpdate, StepTag};
use crate::util::extract_json_object;

/// Upper bound on queries taken from a model-produced plan.
pub const MAX_QUERIES: usize = 7;

/// Structured plan returned by the planner model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchPlan {
    #[serde(default)]
    pub topic_summary: String,
    #[serde(default)]
    pub key_aspects: Vec<String>,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub expected_sections: Vec<String>,
}

impl ResearchPlan {
    /// Parse a plan from a model reply that may wrap the JSON in prose or fences.
    ///
    /// Blank queries are dropped and the list is capped at [`MAX_QUERIES`]; a
    /// plan left with no queries is rejected.
    pub fn parse(text: &str) -> Result<Self, String> {
        let json = extract_json_object(text).ok_or("no JSON object in planner reply")?;
        let mut plan: ResearchPlan =
            serde_json::from_str(json).map_err(|e| format!("invalid plan JSON: {e}"))?;

        plan.search_queries = plan
            .search_queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_QUERIES)
            .collect();

        if plan.search_queries.is_empty() {
            return Err("plan contains no search queries".to_string());
        }
        Ok(plan)
    }

    /// Canned plan used when the planner is unavailable.
    pub fn fallback(topic: &str) -> Self {
        Self {
            topic_summary: format!("Comprehensive research on {topic}"),
            key_aspects: vec![
                "Overview and definition".to_string(),
                "Current trends".to_string(),
                "Major cases".to_string(),
                "Future outlook".to_string(),
            ],
            search_queries: vec![
                topic.to_string(),
                format!("{topic} latest trends 2025"),
                format!("{topic} case study analysis"),
                format!("{topic} outlook"),
                format!("what is {topic}"),
                format!("{topic} trends 2025"),
            ],
            expected_sections: vec![
                "Overview".to_string(),
                "Main Content".to_string(),
                "Case Analysis".to_string(),
                "Conclusion and Outlook".to_string(),
            ],
        }
    }

    /// Markdown rendering stored as `plan_summary`.
    pub fn render(&self) -> String {
        let mut out = String::from("## Research Plan\n\n");
        out.push_str(&format!("**Topic summary:** {}\n\n", self.topic_summary));

        out.push_str("**Key aspects:**\n");
        for aspect in &self.key_aspects {
            out.push_str(&format!("- {aspect}\n"));
        }

        out.push_str("\n**Search queries:**\n");
        for (i, query) in self.search_queries.iter().enumerate() {
            out.push_str(&format!("{}. {query}\n", i + 1));
        }

        out.push_str("\n**Expected sections:**\n");
        for section in &self.expected_sections {
            out.push_str(&format!("- {section}\n"));
        }
        out
    }
}

pub struct PlanStage {
    llm: Arc<dyn LanguageModel>,
    settings: Arc<StageSettings>,
}

impl PlanStage {
    pub fn new(llm: Arc<dyn LanguageModel>, settings: Arc<StageSettings>) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl Stage for PlanStage {
    fn name(&self) -> StageName {
        StageName::Plan
    }

    fn writes(&self) -> &'static [StateField] {
        &[
            StateField::PlanSummary,
            StateField::SearchQueries,
            StateField::CurrentStep,
            StateField::Errors,
        ]
    }

    async fn run(&self, state: &ResearchState) -> StageOutcome {
        let prompt = Prompt::new(
            PLANNER_SYSTEM_PROMPT,
            planner_prompt(&state.topic, &self.settings.language),
            self.settings.plan_temperature,
        );
        let reply = self.llm.complete(PromptRole::Planner, &prompt).await;

        let mut update = StateUpdate::new();
        let plan = match attempt(self.name(), "planning", reply).and_then(|text| ResearchPlan::parse(&text)) {
            Attempt::Ok(plan) => plan,
            Attempt::Fallback(reason) => {
                update = update.error(format!("planning failed, using fallback plan: {reason}"));
                ResearchPlan::fallback(&state.topic)
            }
        };

        info!(queries = plan.search_queries.len(), "research plan ready");
        let update = update
            .plan_summary(plan.render())
            .search_queries(plan.search_queries);
        StageOutcome::new(update, StepTag::PlanningComplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    fn stage(model: ScriptedModel) -> (PlanStage, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (PlanStage::new(model.clone(), Arc::new(StageSettings::default())), model)
    }

    const PLAN_REPLY: &str = r#"Here is the plan:
```json
{"topic_summary": "How Rust handles async",
 "key_aspects": ["futures", "executors"],
 "search_queries": ["rust futures", "tokio runtime", "async traits", "pin in rust", "rust async 2025"],
 "expected_sections": ["Intro", "Runtime", "Conclusion"]}
```"#;

    #[test]
    fn test_parse_plan_from_fenced_reply() {
        let plan = ResearchPlan::parse(PLAN_REPLY).unwrap();
        assert_eq!(plan.topic_summary, "How Rust handles async");
        assert_eq!(plan.search_queries.len(), 5);
        assert_eq!(plan.expected_sections[1], "Runtime");
    }

    #[test]
    fn test_parse_plan_caps_and_trims_queries() {
        let reply = r#"{"search_queries": ["a", " ", "b", "c", "d", "e", "f", "g", "h", "i"]}"#;
        let plan = ResearchPlan::parse(reply).unwrap();
        assert_eq!(plan.search_queries, vec!["a", "b", "c", "d", "e", "f", "g"]);
    }

    #[test]
    fn test_parse_plan_without_queries_is_rejected() {
        let err = ResearchPlan::parse(r#"{"topic_summary": "x", "search_queries": []}"#).unwrap_err();
        assert!(err.contains("no search queries"));
        assert!(ResearchPlan::parse("I cannot help with that").is_err());
    }

    #[test]
    fn test_fallback_plan_queries() {
        let plan = ResearchPlan::fallback("X");
        assert_eq!(plan.search_queries.len(), 6);
        assert!(plan.search_queries.contains(&"X".to_string()));
        assert!(plan.search_queries.contains(&"X trends 2025".to_string()));
        assert!(plan.search_queries.contains(&"what is X".to_string()));
        assert_eq!(plan.expected_sections.len(), 4);
    }

    #[test]
    fn test_render_lists_numbered_queries() {
        let rendered = ResearchPlan::fallback("X").render();
        assert!(rendered.starts_with("## Research Plan"));
        assert!(rendered.contains("1. X\n"));
        assert!(rendered.contains("6. X trends 2025\n"));
        assert!(rendered.contains("- Case Analysis"));
    }

    #[tokio::test]
    async fn test_run_uses_model_plan() {
        let (stage, model) = stage(ScriptedModel::new().reply(PromptRole::Planner, PLAN_REPLY));
        let state = ResearchState::new("rust async", 2).unwrap();

        let outcome = stage.run(&state).await;
        assert_eq!(outcome.hint, StepTag::PlanningComplete);

        let mut next = state.clone();
        next.apply(outcome.into_update());
        assert_eq!(next.search_queries[0], "rust futures");
        assert!(next.plan_summary.unwrap().contains("How Rust handles async"));
        assert!(next.errors.is_empty());

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.temperature, 0.3);
        assert!(calls[0].1.user.contains("rust async"));
    }

    #[tokio::test]
    async fn test_run_falls_back_on_model_failure() {
        let (stage, _) = stage(ScriptedModel::new());
        let state = ResearchState::new("X", 2).unwrap();

        let mut next = state.clone();
        next.apply(stage.run(&state).await.into_update());

        assert_eq!(next.search_queries, ResearchPlan::fallback("X").search_queries);
        assert_eq!(next.errors.len(), 1);
        assert!(next.errors[0].starts_with("planning failed"));
        assert_eq!(next.current_step, StepTag::PlanningComplete);
    }

    #[tokio::test]
    async fn test_run_falls_back_on_unparseable_reply() {
        let (stage, _) = stage(ScriptedModel::new().reply(PromptRole::Planner, "Sure, here are ideas: a, b, c"));
        let state = ResearchState::new("X", 2).unwrap();

        let mut next = state.clone();
        next.apply(stage.run(&state).await.into_update());
        assert_eq!(next.search_queries.len(), 6);
        assert!(next.errors[0].contains("no JSON object"));
    }

    #[test]
    fn test_writes_exclude_immutable_fields() {
        let (stage, _) = stage(ScriptedModel::new());
        assert!(stage.writes().iter().all(|f| !f.is_immutable()));
    }
}
