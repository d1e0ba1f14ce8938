//! Web-search collaborator.
//!
//! Real implementation: [`TavilyClient`]. Offline implementation: [`MockSearch`],
//! used when no search key is configured.

pub mod mock;
pub mod tavily;

use async_trait::async_trait;

use crate::errors::CollaboratorError;
use crate::state::SearchResult;

pub use mock::MockSearch;
pub use tavily::TavilyClient;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query, returning at most `max_results` hits in rank order.
    ///
    /// An empty vector means "nothing found" and is not an error.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CollaboratorError>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}
