use async_trait::async_trait;
use metatools_core::{DetailLevel, MetatoolsResult, ToolDoc, ToolSummary};
use serde::Serialize;

/// One hit from [`Discovery::search`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub summary: ToolSummary,
    /// Relevance score; `0.0` for an empty query.
    pub score: f32,
}

/// Read access to a tool catalog.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Returns at most `limit` tools matching `query`. An empty query matches
    /// every tool.
    async fn search(&self, query: &str, limit: usize) -> MetatoolsResult<Vec<SearchResult>>;

    /// Resolves documentation for the tool identified by `id`.
    async fn describe_tool(&self, id: &str, detail: DetailLevel) -> MetatoolsResult<ToolDoc>;
}
