//! File configuration for sleuth, read from `sleuth.toml`.
//!
//! Every section and key is optional; missing values take the defaults below.
//! Values are layered file → environment → CLI by [`crate::config::SleuthConfig`].
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 60
//! plan_temperature = 0.3
//! summarize_temperature = 0.3
//! write_temperature = 0.5
//! review_temperature = 0.2
//!
//! [search]
//! provider = "auto"
//! api_key_env = "TAVILY_API_KEY"
//! max_results_per_query = 3
//! search_depth = "basic"
//! timeout_secs = 30
//!
//! [pipeline]
//! max_iterations = 2
//! min_search_results = 3
//! max_sources = 20
//! research_concurrency = 1
//! scoring = "keywords"
//!
//! [report]
//! output_dir = "reports"
//! language = "English"
//! author = "AI Research Agent"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::openai::DEFAULT_ENDPOINT;
use crate::stages::ScoringMode;

pub const CONFIG_FILE_NAME: &str = "sleuth.toml";

/// Which search backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// Tavily when a key is available, otherwise canned results.
    #[default]
    Auto,
    Tavily,
    Mock,
}

impl std::fmt::Display for SearchProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchProviderKind::Auto => write!(f, "auto"),
            SearchProviderKind::Tavily => write!(f, "tavily"),
            SearchProviderKind::Mock => write!(f, "mock"),
        }
    }
}

/// Language-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Model name; falls back to `OPENAI_MODEL`, then `gpt-4o-mini`
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_plan_temperature")]
    pub plan_temperature: f32,
    #[serde(default = "default_plan_temperature")]
    pub summarize_temperature: f32,
    #[serde(default = "default_write_temperature")]
    pub write_temperature: f32,
    #[serde(default = "default_review_temperature")]
    pub review_temperature: f32,
}

fn default_llm_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_plan_temperature() -> f32 {
    0.3
}

fn default_write_temperature() -> f32 {
    0.5
}

fn default_review_temperature() -> f32 {
    0.2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: None,
            api_key_env: default_llm_key_env(),
            timeout_secs: default_llm_timeout(),
            plan_temperature: default_plan_temperature(),
            summarize_temperature: default_plan_temperature(),
            write_temperature: default_write_temperature(),
            review_temperature: default_review_temperature(),
        }
    }
}

/// Web-search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProviderKind,
    /// Override the Tavily endpoint (e.g. a proxy)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results_per_query: usize,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_search_depth() -> String {
    "basic".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            endpoint: None,
            api_key_env: default_search_key_env(),
            max_results_per_query: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout(),
        }
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Revision budget used when the CLI does not pass one
    #[serde(default = "default_max_iterations")]
    pub max_iterations: i64,
    #[serde(default = "default_min_search_results")]
    pub min_search_results: usize,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_research_concurrency")]
    pub research_concurrency: usize,
    #[serde(default)]
    pub scoring: ScoringMode,
}

fn default_max_iterations() -> i64 {
    2
}

fn default_min_search_results() -> usize {
    3
}

fn default_max_sources() -> usize {
    20
}

fn default_research_concurrency() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            min_search_results: default_min_search_results(),
            max_sources: default_max_sources(),
            research_concurrency: default_research_concurrency(),
            scoring: ScoringMode::default(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_author")]
    pub author: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_language() -> String {
    "English".to_string()
}

fn default_author() -> String {
    "AI Research Agent".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            language: default_language(),
            author: default_author(),
        }
    }
}

/// Root of `sleuth.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthToml {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl SleuthToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sleuth.toml")
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize sleuth.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.pipeline.max_iterations <= 0 {
            warnings.push(format!(
                "pipeline.max_iterations must be greater than zero, got {}",
                self.pipeline.max_iterations
            ));
        }
        if self.pipeline.research_concurrency == 0 {
            warnings.push("pipeline.research_concurrency is 0; queries will run one at a time".to_string());
        }
        if self.pipeline.max_sources == 0 {
            warnings.push("pipeline.max_sources is 0; reports will cite no sources".to_string());
        }
        if self.search.max_results_per_query == 0 {
            warnings.push("search.max_results_per_query is 0; research will find nothing".to_string());
        }
        if self.pipeline.min_search_results == 0 {
            warnings.push("pipeline.min_search_results is 0; reports may be written without evidence".to_string());
        }
        for (name, value) in [
            ("plan_temperature", self.llm.plan_temperature),
            ("summarize_temperature", self.llm.summarize_temperature),
            ("write_temperature", self.llm.write_temperature),
            ("review_temperature", self.llm.review_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                warnings.push(format!("llm.{name} = {value} is outside 0.0..=2.0"));
            }
        }
        if self.llm.timeout_secs == 0 || self.search.timeout_secs == 0 {
            warnings.push("timeouts of 0 seconds make every collaborator call fail".to_string());
        }

        warnings
    }
}

/// User-level config location, e.g. `~/.config/sleuth/sleuth.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sleuth").join(CONFIG_FILE_NAME))
}
