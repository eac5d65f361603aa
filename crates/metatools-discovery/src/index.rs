use crate::discovery::{Discovery, SearchResult};
use async_trait::async_trait;
use metatools_core::{
    DetailLevel, DocEntry, MetatoolsError, MetatoolsResult, Tool, ToolBackend, ToolDoc,
    ToolSummary,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::info;

struct IndexEntry {
    tool: Tool,
    backend: ToolBackend,
    doc: Option<DocEntry>,
    summary: ToolSummary,
}

/// In-memory tool catalog keyed by tool identifier.
///
/// Iteration order is the identifier order, so listings are stable between
/// requests as long as the catalog does not change.
pub struct ToolIndex {
    entries: RwLock<BTreeMap<String, IndexEntry>>,
}

impl ToolIndex {
    /// Empty catalog.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a tool with the backend that executes it.
    ///
    /// Fails on an invalid name or when the identifier is already taken.
    pub fn register_tool(
        &self,
        tool: Tool,
        backend: ToolBackend,
        doc: Option<DocEntry>,
    ) -> MetatoolsResult<()> {
        tool.validate()?;
        let id = tool.id();

        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(MetatoolsError::Registry(format!(
                "tool '{id}' is already registered"
            )));
        }

        let summary = ToolSummary::from_tool(&tool, doc.as_ref());
        entries.insert(
            id.clone(),
            IndexEntry {
                tool,
                backend,
                doc,
                summary,
            },
        );
        info!(tool = %id, "Registered tool");
        Ok(())
    }

    /// Removes a tool. Returns whether it was present.
    pub fn unregister_tool(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    /// The backend registered for `id`.
    pub fn backend(&self, id: &str) -> Option<ToolBackend> {
        self.entries.read().get(id).map(|e| e.backend.clone())
    }

    /// The tool definition registered for `id`.
    pub fn tool(&self, id: &str) -> Option<Tool> {
        self.entries.read().get(id).map(|e| e.tool.clone())
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Synchronous search used by the [`Discovery`] impl.
    pub fn search_sync(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let entries = self.entries.read();
        let terms: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        if terms.is_empty() {
            return entries
                .values()
                .take(limit)
                .map(|e| SearchResult {
                    summary: e.summary.clone(),
                    score: 0.0,
                })
                .collect();
        }

        let mut hits: Vec<SearchResult> = entries
            .values()
            .filter_map(|e| {
                let score = score_entry(e, &terms);
                (score > 0.0).then(|| SearchResult {
                    summary: e.summary.clone(),
                    score,
                })
            })
            .collect();

        // BTreeMap order already sorts by id; a stable sort keeps it for ties.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    /// Synchronous describe used by the [`Discovery`] impl.
    pub fn describe_sync(&self, id: &str, detail: DetailLevel) -> MetatoolsResult<ToolDoc> {
        let entries = self.entries.read();
        let entry = entries
            .get(id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("tool '{id}'")))?;

        let summary = if entry.summary.summary.is_empty() {
            entry.tool.description.clone()
        } else {
            entry.summary.summary.clone()
        };

        let mut doc = ToolDoc {
            summary,
            ..ToolDoc::default()
        };
        if matches!(detail, DetailLevel::Schema | DetailLevel::Full) {
            doc.tool = Some(entry.tool.clone());
        }
        if detail == DetailLevel::Full {
            if let Some(extra) = &entry.doc {
                doc.notes = extra.notes.clone();
                doc.examples = extra.examples.clone();
                doc.external_refs = extra.external_refs.clone();
            }
        }
        Ok(doc)
    }
}

impl Default for ToolIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn score_entry(entry: &IndexEntry, terms: &[String]) -> f32 {
    let name = entry.tool.name.to_lowercase();
    let namespace = entry.tool.namespace.to_lowercase();
    let description = entry.tool.description.to_lowercase();
    let summary = entry.summary.summary.to_lowercase();
    let category = entry.tool.category.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let mut score = 0.0;
            if name == *term {
                score += 5.0;
            } else if name.contains(term.as_str()) {
                score += 3.0;
            }
            if namespace.contains(term.as_str()) {
                score += 2.0;
            }
            if entry.summary.tags.iter().any(|t| t.to_lowercase() == *term) {
                score += 2.0;
            }
            if category.contains(term.as_str()) {
                score += 1.5;
            }
            if description.contains(term.as_str()) || summary.contains(term.as_str()) {
                score += 1.0;
            }
            score
        })
        .sum()
}

#[async_trait]
impl Discovery for ToolIndex {
    async fn search(&self, query: &str, limit: usize) -> MetatoolsResult<Vec<SearchResult>> {
        Ok(self.search_sync(query, limit))
    }

    async fn describe_tool(&self, id: &str, detail: DetailLevel) -> MetatoolsResult<ToolDoc> {
        self.describe_sync(id, detail)
    }
}
