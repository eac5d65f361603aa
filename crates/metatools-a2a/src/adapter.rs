//! Canonical tool/provider representation and its rendering into an
//! [`AgentCard`].

use crate::protocol::{
    AgentCapabilities, AgentCard, AgentInterface, AgentSkill, A2A_PROTOCOL_VERSION,
    PROTOCOL_BINDING,
};
use metatools_core::ToolSummary;
use tracing::warn;

/// Input modes advertised when a skill declares none.
pub const DEFAULT_INPUT_MODES: &[&str] = &["application/json"];
/// Output modes advertised when a skill declares none.
pub const DEFAULT_OUTPUT_MODES: &[&str] = &["text/plain"];

/// Picks the tool's summary when it has one, else its short description.
pub fn choose_description(summary: &str, short_description: &str) -> String {
    if summary.is_empty() {
        short_description.to_string()
    } else {
        summary.to_string()
    }
}

/// A catalog entry projected into the shape the adapter renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTool {
    pub namespace: String,
    pub name: String,
    pub display_name: String,
    pub summary: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
}

impl CanonicalTool {
    /// Projects a catalog summary into canonical form.
    pub fn from_summary(summary: &ToolSummary) -> Self {
        Self {
            namespace: summary.namespace.clone(),
            name: summary.name.clone(),
            display_name: summary.name.clone(),
            summary: summary.summary.clone(),
            description: choose_description(&summary.summary, &summary.short_description),
            category: summary.category.clone(),
            tags: summary.tags.clone(),
            input_modes: summary.input_modes.clone(),
            output_modes: summary.output_modes.clone(),
        }
    }

    /// `namespace:name`, or `name` without a namespace.
    pub fn id(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.namespace, self.name)
        }
    }
}

/// Capability flags of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub tasks: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            tasks: true,
        }
    }
}

/// Where and how the provider is reachable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMeta {
    pub supported_interfaces: Vec<AgentInterface>,
    pub documentation_url: Option<String>,
    pub icon_url: Option<String>,
}

impl SourceMeta {
    /// A single JSON-RPC interface at `base_url`.
    pub fn jsonrpc(base_url: impl Into<String>) -> Self {
        Self {
            supported_interfaces: vec![AgentInterface {
                url: base_url.into(),
                protocol_binding: PROTOCOL_BINDING.to_string(),
                protocol_version: A2A_PROTOCOL_VERSION.to_string(),
            }],
            ..Self::default()
        }
    }
}

/// Agent identity plus the tools it exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalProvider {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: ProviderCapabilities,
    pub skills: Vec<CanonicalTool>,
    pub source_meta: SourceMeta,
}

/// Renders canonical providers into A2A agent cards.
///
/// Tools without a name are dropped from the card and logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct A2aAdapter;

impl A2aAdapter {
    /// Stateless; equivalent to `A2aAdapter::default()`.
    pub fn new() -> Self {
        Self
    }

    /// Renders the agent card for `provider`.
    pub fn render(&self, provider: &CanonicalProvider) -> AgentCard {
        let skills = provider
            .skills
            .iter()
            .filter_map(|tool| {
                if tool.name.is_empty() {
                    warn!(namespace = %tool.namespace, "Dropping unnamed tool from agent card");
                    return None;
                }
                Some(render_skill(tool))
            })
            .collect();

        AgentCard {
            name: provider.name.clone(),
            description: provider.description.clone(),
            version: provider.version.clone(),
            protocol_version: A2A_PROTOCOL_VERSION.to_string(),
            supported_interfaces: provider.source_meta.supported_interfaces.clone(),
            capabilities: AgentCapabilities {
                streaming: provider.capabilities.streaming,
                tasks: provider.capabilities.tasks,
                push_notifications: false,
            },
            default_input_modes: DEFAULT_INPUT_MODES.iter().map(ToString::to_string).collect(),
            default_output_modes: DEFAULT_OUTPUT_MODES.iter().map(ToString::to_string).collect(),
            skills,
            documentation_url: non_empty(provider.source_meta.documentation_url.as_deref()),
            icon_url: non_empty(provider.source_meta.icon_url.as_deref()),
        }
    }
}

fn render_skill(tool: &CanonicalTool) -> AgentSkill {
    let name = if tool.display_name.is_empty() {
        tool.name.clone()
    } else {
        tool.display_name.clone()
    };
    let description = if tool.description.is_empty() {
        tool.summary.clone()
    } else {
        tool.description.clone()
    };

    AgentSkill {
        id: tool.id(),
        name,
        description,
        tags: tool.tags.clone(),
        input_modes: tool.input_modes.clone(),
        output_modes: tool.output_modes.clone(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}
