//! Language-model collaborator.
//!
//! Stages talk to a hosted model only through [`LanguageModel`]. Real
//! implementation: [`OpenAiClient`]. Offline stand-in: [`UnavailableModel`],
//! which fails every call so each stage takes its deterministic fallback.

pub mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::CollaboratorError;

pub use openai::OpenAiClient;

/// Which stage a prompt is for. Lets test doubles script replies per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    Planner,
    Summarizer,
    Writer,
    Reviewer,
}

impl std::fmt::Display for PromptRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptRole::Planner => write!(f, "planner"),
            PromptRole::Summarizer => write!(f, "summarizer"),
            PromptRole::Writer => write!(f, "writer"),
            PromptRole::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// A system + user prompt pair with its sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Return the model's text reply. Implementations bound the call with a timeout.
    async fn complete(&self, role: PromptRole, prompt: &Prompt) -> Result<String, CollaboratorError>;
}

/// A model that is never reachable.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for UnavailableModel {
    async fn complete(&self, _role: PromptRole, _prompt: &Prompt) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::NotConfigured(self.reason.clone()))
    }
}
