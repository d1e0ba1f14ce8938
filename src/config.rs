use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::errors::ConfigurationError;
use crate::llm::openai::DEFAULT_MODEL;
use crate::llm::{LanguageModel, OpenAiClient, UnavailableModel};
use crate::search::{MockSearch, SearchProvider, TavilyClient};
use crate::sleuth_config::{CONFIG_FILE_NAME, SearchProviderKind, SleuthToml, global_config_path};
use crate::stages::StageSettings;

/// Key prefixes copied from sample `.env` files that were never filled in.
const PLACEHOLDER_KEY_PREFIXES: &[&str] = &["sk-your", "tvly-your", "your-", "<"];

/// Treat empty and placeholder keys as absent.
pub fn usable_key(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| !PLACEHOLDER_KEY_PREFIXES.iter().any(|p| v.starts_with(p)))
}

/// Runtime configuration for a research run.
///
/// Bridges `sleuth.toml` with the environment and CLI flags, and builds the
/// collaborators the orchestrator needs.
#[derive(Debug, Clone, Default)]
pub struct SleuthConfig {
    pub toml: SleuthToml,
    /// File the settings were read from, if any
    pub source: Option<PathBuf>,
    /// Skip all network collaborators
    pub offline: bool,
}

impl SleuthConfig {
    pub fn new(toml: SleuthToml) -> Self {
        Self {
            toml,
            source: None,
            offline: false,
        }
    }

    /// Resolve the config file: `explicit`, then `<project_dir>/sleuth.toml`,
    /// then the user config directory. No file at all means defaults.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let toml = SleuthToml::load(path)?;
            return Ok(Self::from_file(toml, path));
        }

        let candidates = std::iter::once(project_dir.join(CONFIG_FILE_NAME)).chain(global_config_path());
        for path in candidates {
            if path.exists() {
                let toml = SleuthToml::load(&path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
                return Ok(Self::from_file(toml, &path));
            }
        }
        Ok(Self::default())
    }

    fn from_file(toml: SleuthToml, path: &Path) -> Self {
        Self {
            toml,
            source: Some(path.to_path_buf()),
            offline: false,
        }
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_research_concurrency(mut self, concurrency: Option<usize>) -> Self {
        if let Some(n) = concurrency {
            self.toml.pipeline.research_concurrency = n;
        }
        self
    }

    /// Model name, with fallback to `OPENAI_MODEL`.
    pub fn model(&self) -> String {
        self.toml
            .llm
            .model
            .clone()
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn llm_api_key(&self) -> Option<String> {
        usable_key(std::env::var(&self.toml.llm.api_key_env).ok())
    }

    pub fn search_api_key(&self) -> Option<String> {
        usable_key(std::env::var(&self.toml.search.api_key_env).ok())
    }

    pub fn default_max_iterations(&self) -> i64 {
        self.toml.pipeline.max_iterations
    }

    pub fn min_search_results(&self) -> usize {
        self.toml.pipeline.min_search_results
    }

    pub fn report_dir(&self) -> &Path {
        &self.toml.report.output_dir
    }

    pub fn stage_settings(&self) -> StageSettings {
        let llm = &self.toml.llm;
        let pipeline = &self.toml.pipeline;
        StageSettings {
            plan_temperature: llm.plan_temperature,
            summarize_temperature: llm.summarize_temperature,
            write_temperature: llm.write_temperature,
            review_temperature: llm.review_temperature,
            max_results_per_query: self.toml.search.max_results_per_query,
            max_sources: pipeline.max_sources,
            research_concurrency: pipeline.research_concurrency.max(1),
            scoring: pipeline.scoring,
            language: self.toml.report.language.clone(),
            author: self.toml.report.author.clone(),
        }
    }

    /// The language model for this run.
    ///
    /// Offline runs and runs without a key get a model that always fails, so
    /// every stage takes its fallback path.
    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>, ConfigurationError> {
        if self.offline {
            return Ok(Arc::new(UnavailableModel::new("offline mode")));
        }
        let Some(key) = self.llm_api_key() else {
            warn!(env = %self.toml.llm.api_key_env, "no language model key; stages will use fallbacks");
            return Ok(Arc::new(UnavailableModel::new(format!(
                "{} is not set",
                self.toml.llm.api_key_env
            ))));
        };
        let client = OpenAiClient::new(
            &self.toml.llm.endpoint,
            key,
            self.model(),
            Duration::from_secs(self.toml.llm.timeout_secs),
        )
        .map_err(|e| ConfigurationError::InvalidSetting(format!("llm client: {e}")))?;
        Ok(Arc::new(client))
    }

    /// The search backend for this run.
    pub fn search_provider(&self) -> Result<Arc<dyn SearchProvider>, ConfigurationError> {
        let search = &self.toml.search;
        let kind = if self.offline {
            SearchProviderKind::Mock
        } else {
            search.provider
        };

        let key = match kind {
            SearchProviderKind::Mock => return Ok(Arc::new(MockSearch)),
            SearchProviderKind::Auto => match self.search_api_key() {
                Some(key) => key,
                None => {
                    warn!(env = %search.api_key_env, "no search key; using canned mock results");
                    return Ok(Arc::new(MockSearch));
                }
            },
            SearchProviderKind::Tavily => self.search_api_key().ok_or_else(|| {
                ConfigurationError::InvalidSetting(format!(
                    "search.provider = \"tavily\" requires {}",
                    search.api_key_env
                ))
            })?,
        };

        let mut client = TavilyClient::new(
            key,
            &search.search_depth,
            Duration::from_secs(search.timeout_secs),
        )
        .map_err(|e| ConfigurationError::InvalidSetting(format!("search client: {e}")))?;
        if let Some(endpoint) = &search.endpoint {
            client = client.with_endpoint(endpoint);
        }
        Ok(Arc::new(client))
    }
}
