//! Tavily search API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SearchProvider;
use crate::errors::CollaboratorError;
use crate::state::SearchResult;
use crate::util::with_timeout;

pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl From<RawResult> for SearchResult {
    fn from(raw: RawResult) -> Self {
        SearchResult::new(raw.title, raw.url, raw.content, raw.score)
    }
}

#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    search_depth: String,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(
        api_key: impl Into<String>,
        search_depth: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: TAVILY_SEARCH_URL.to_string(),
            api_key: api_key.into(),
            search_depth: search_depth.into(),
            timeout,
        })
    }

    /// Point the client at a different endpoint (self-hosted proxy).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn send(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: &self.search_depth,
            include_answer: false,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_results(&body, max_results)
    }
}

fn parse_results(body: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::MalformedResponse(format!("invalid search JSON: {e}")))?;
    Ok(parsed
        .results
        .into_iter()
        .take(max_results)
        .map(SearchResult::from)
        .collect())
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        debug!(query, max_results, "tavily search");
        with_timeout(self.timeout, self.send(query, max_results)).await
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_fills_missing_fields() {
        let body = r#"{"results":[
            {"title":"Rust","url":"https://rust-lang.org","content":"A language","score":0.97},
            {"url":"https://b.example"}
        ]}"#;
        let results = parse_results(body, 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Rust");
        assert_eq!(results[0].score, 0.97);
        assert_eq!(results[1].title, "");
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn test_parse_results_caps_to_max() {
        let body = r#"{"results":[{"url":"a"},{"url":"b"},{"url":"c"},{"url":"d"}]}"#;
        let results = parse_results(body, 3).unwrap();
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_results_without_results_key_is_empty() {
        assert!(parse_results(r#"{"answer":null}"#, 3).unwrap().is_empty());
    }

    #[test]
    fn test_parse_results_rejects_garbage() {
        assert!(matches!(
            parse_results("not json", 3),
            Err(CollaboratorError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_serializes_expected_fields() {
        let request = SearchRequest {
            api_key: "tvly-key",
            query: "rust async",
            max_results: 3,
            search_depth: "basic",
            include_answer: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["query"], "rust async");
        assert_eq!(value["max_results"], 3);
        assert_eq!(value["search_depth"], "basic");
    }
}
