//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::CollaboratorError;
use crate::llm::{LanguageModel, Prompt, PromptRole};
use crate::search::SearchProvider;
use crate::state::SearchResult;

/// Replies queued per role. An empty queue fails the call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<HashMap<PromptRole, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<(PromptRole, Prompt)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, role: PromptRole, text: &str) -> Self {
        self.push(role, Ok(text.to_string()))
    }

    pub fn fail(self, role: PromptRole, reason: &str) -> Self {
        self.push(role, Err(reason.to_string()))
    }

    fn push(self, role: PromptRole, entry: Result<String, String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(entry);
        self
    }

    pub fn calls(&self) -> Vec<(PromptRole, Prompt)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, role: PromptRole, prompt: &Prompt) -> Result<String, CollaboratorError> {
        self.calls.lock().unwrap().push((role, prompt.clone()));
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&role)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(CollaboratorError::MalformedResponse(reason)),
            None => Err(CollaboratorError::NotConfigured(format!("no scripted {role} reply"))),
        }
    }
}

type SearchFn = dyn Fn(&str) -> Result<Vec<SearchResult>, CollaboratorError> + Send + Sync;

/// Search double driven by a closure over the query.
pub struct ScriptedSearch {
    respond: Box<SearchFn>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new(respond: impl Fn(&str) -> Result<Vec<SearchResult>, CollaboratorError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// `n` distinct hits per query.
    pub fn hits(n: usize) -> Self {
        Self::new(move |query| Ok(hits_for(query, n)))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(CollaboratorError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

pub fn hits_for(query: &str, n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|i| {
            SearchResult::new(
                format!("{query} #{i}"),
                format!("https://example.org/{}/{i}", query.replace(' ', "-")),
                format!("content about {query} number {i}"),
                1.0 - i as f64 * 0.1,
            )
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.respond)(query).map(|results| results.into_iter().take(max_results).collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
