//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sleuth::errors::CollaboratorError;
use sleuth::llm::{LanguageModel, Prompt, PromptRole};
use sleuth::search::SearchProvider;
use sleuth::state::SearchResult;

/// Queued replies per role; an exhausted queue fails the call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<HashMap<PromptRole, VecDeque<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, role: PromptRole, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(text.into());
        self
    }

    pub fn replies(mut self, role: PromptRole, texts: &[&str]) -> Self {
        for text in texts {
            self = self.reply(role, *text);
        }
        self
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, role: PromptRole, _prompt: &Prompt) -> Result<String, CollaboratorError> {
        self.replies
            .lock()
            .unwrap()
            .get_mut(&role)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| CollaboratorError::NotConfigured(format!("no {role} reply")))
    }
}

/// Search double: `per_query` hits for every query, optional per-query delay.
pub struct FixedSearch {
    pub per_query: usize,
    pub fail: bool,
    pub delay: fn(&str) -> Duration,
}

impl FixedSearch {
    pub fn hits(per_query: usize) -> Self {
        Self {
            per_query,
            fail: false,
            delay: |_| Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            per_query: 0,
            fail: true,
            delay: |_| Duration::ZERO,
        }
    }
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        let delay = (self.delay)(query);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CollaboratorError::Timeout {
                after: Duration::from_secs(30),
            });
        }
        Ok((0..self.per_query.min(max_results))
            .map(|i| {
                SearchResult::new(
                    format!("{query} result {i}"),
                    format!("https://example.net/{}/{i}", query.replace(' ', "_")),
                    format!("Findings about {query}"),
                    0.9,
                )
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// A planner reply with the given queries.
pub fn plan_json(queries: &[&str]) -> String {
    let queries: Vec<String> = queries.iter().map(|q| format!("\"{q}\"")).collect();
    format!(
        r#"{{"topic_summary": "summary", "key_aspects": ["a"], "search_queries": [{}], "expected_sections": ["Intro"]}}"#,
        queries.join(", ")
    )
}
