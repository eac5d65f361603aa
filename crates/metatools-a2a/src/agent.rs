//! The agent facade: identity, skill listing and invocation.
//!
//! An [`Agent`] holds no per-request state. The catalog is queried fresh
//! for every card and listing so newly registered tools show up at once.

use crate::adapter::{
    choose_description, A2aAdapter, CanonicalProvider, CanonicalTool, ProviderCapabilities,
    SourceMeta,
};
use crate::normalize::normalize_schema;
use crate::protocol::{AgentCard, WireTool};
use metatools_core::{DetailLevel, InvokeResult, MetatoolsError, MetatoolsResult};
use metatools_discovery::{Discovery, SearchResult};
use metatools_exec::Runner;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Skill limit used when none (or a non-positive one) is configured.
pub const DEFAULT_MAX_SKILLS: usize = 500;

/// Who the agent says it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub description: String,
    pub version: String,
    pub documentation_url: Option<String>,
    pub icon_url: Option<String>,
    /// External URL of the JSON-RPC endpoint.
    pub base_url: String,
}

/// A2A agent backed by a tool catalog and an execution runner.
pub struct Agent {
    identity: AgentIdentity,
    discovery: Option<Arc<dyn Discovery>>,
    runner: Option<Arc<dyn Runner>>,
    max_skills: i64,
}

impl Agent {
    /// Agent with no catalog or runner attached yet.
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            identity,
            discovery: None,
            runner: None,
            max_skills: 0,
        }
    }

    /// Catalog used for the card and the skill listing.
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Backend that executes invocations.
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Caps card and listing size. Non-positive values select the default.
    pub fn with_max_skills(mut self, max_skills: i64) -> Self {
        self.max_skills = max_skills;
        self
    }

    /// Configured identity.
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Whether invocations can run at all.
    pub fn has_runner(&self) -> bool {
        self.runner.is_some()
    }

    /// Maximum number of skills returned by a card or listing.
    pub fn skill_limit(&self) -> usize {
        usize::try_from(self.max_skills)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_SKILLS)
    }

    /// Renders the agent card.
    ///
    /// Fails with [`MetatoolsError::MisconfiguredAgent`] when discovery is
    /// missing or name, description or version is empty.
    pub async fn agent_card(&self) -> MetatoolsResult<AgentCard> {
        let discovery = self.discovery()?;
        let id = &self.identity;
        if id.name.is_empty() || id.description.is_empty() || id.version.is_empty() {
            return Err(MetatoolsError::MisconfiguredAgent(
                "agent name, description, and version are required".into(),
            ));
        }

        let skills = self
            .catalog(discovery)
            .await?
            .iter()
            .map(|r| CanonicalTool::from_summary(&r.summary))
            .collect();

        let provider = CanonicalProvider {
            name: id.name.clone(),
            description: id.description.clone(),
            version: id.version.clone(),
            capabilities: ProviderCapabilities::default(),
            skills,
            source_meta: SourceMeta {
                documentation_url: id.documentation_url.clone(),
                icon_url: id.icon_url.clone(),
                ..SourceMeta::jsonrpc(id.base_url.clone())
            },
        };
        Ok(A2aAdapter::new().render(&provider))
    }

    /// Lists skills with their normalized input schemas.
    ///
    /// A tool whose documentation cannot be fetched is still listed, with
    /// no schema.
    pub async fn list_skills(&self) -> MetatoolsResult<Vec<WireTool>> {
        let discovery = self.discovery()?;
        let results = self.catalog(discovery).await?;

        let mut tools = Vec::with_capacity(results.len());
        for res in results {
            let id = res.summary.id;
            let input_schema = match discovery.describe_tool(&id, DetailLevel::Full).await {
                Ok(doc) => normalize_schema(doc.tool.as_ref().and_then(|t| t.input_schema.as_ref())),
                Err(e) => {
                    warn!(skill = %id, error = %e, "Skill documentation unavailable; listing without schema");
                    None
                }
            };
            tools.push(WireTool {
                description: choose_description(&res.summary.summary, &res.summary.short_description),
                name: id,
                input_schema,
            });
        }
        Ok(tools)
    }

    /// Runs a skill and wraps its structured result in one text block.
    pub async fn invoke(
        &self,
        skill_id: &str,
        arguments: Map<String, Value>,
    ) -> MetatoolsResult<InvokeResult> {
        let runner = self.runner.as_ref().ok_or(MetatoolsError::NoRunner)?;
        let result = runner.run(skill_id, arguments).await?;
        info!(
            skill = %skill_id,
            duration_ms = result.duration.as_millis() as u64,
            "Skill invoked"
        );
        Ok(InvokeResult::text(stringify(&result.structured)))
    }

    fn discovery(&self) -> MetatoolsResult<&Arc<dyn Discovery>> {
        self.discovery
            .as_ref()
            .ok_or_else(|| MetatoolsError::MisconfiguredAgent("discovery not configured".into()))
    }

    async fn catalog(&self, discovery: &Arc<dyn Discovery>) -> MetatoolsResult<Vec<SearchResult>> {
        discovery.search("", self.skill_limit()).await
    }
}

/// Text rendering of a structured result.
///
/// Strings are used verbatim, null becomes empty and everything else is
/// JSON-encoded.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}
