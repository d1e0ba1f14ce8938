use async_trait::async_trait;

use super::SearchProvider;
use crate::errors::CollaboratorError;
use crate::state::SearchResult;

/// Canned search results for offline runs and demos.
///
/// Every query yields the same two hits, titled after the query.
#[derive(Debug, Clone, Default)]
pub struct MockSearch;

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError> {
        let results = vec![
            SearchResult::new(
                format!("{query} - Example Result 1"),
                "https://example.com/result1",
                format!("This is an example search result about {query}. It stands in for live web content."),
                0.9,
            ),
            SearchResult::new(
                format!("{query} - Example Result 2"),
                "https://example.com/result2",
                format!("Additional example material on {query}. Configure a search API key for real results."),
                0.8,
            ),
        ];
        Ok(results.into_iter().take(max_results).collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
