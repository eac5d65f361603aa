use crate::{MetatoolsError, MetatoolsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum length of [`ToolSummary::short_description`], in characters.
pub const SHORT_DESCRIPTION_LEN: usize = 120;

/// A tool definition as registered in a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Name, unique within its namespace.
    pub name: String,
    /// Optional namespace; part of the identifier when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Free-form description of what the tool does.
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Declared input schema. Usually a JSON Schema object, but any
    /// structured value is accepted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_modes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_modes: Vec<String>,
}

impl Tool {
    /// Creates a tool with just a name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the declared input schema.
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Sets the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Canonical identifier: `namespace:name`, or just `name` without a namespace.
    pub fn id(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.namespace, self.name)
        }
    }

    /// Checks that name and namespace are usable as identifier segments.
    pub fn validate(&self) -> MetatoolsResult<()> {
        if self.name.is_empty() {
            return Err(MetatoolsError::Registry("tool name is required".into()));
        }
        if !is_valid_segment(&self.name) {
            return Err(MetatoolsError::Registry(format!(
                "invalid tool name '{}': use letters, digits, '_', '-' or '.'",
                self.name
            )));
        }
        if !self.namespace.is_empty() && !is_valid_segment(&self.namespace) {
            return Err(MetatoolsError::Registry(format!(
                "invalid namespace '{}' for tool '{}'",
                self.namespace, self.name
            )));
        }
        Ok(())
    }
}

fn is_valid_segment(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// How a registered tool is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ToolBackend {
    /// An in-process handler registered with the runner under `name`.
    Local {
        /// Handler name.
        name: String,
    },
    /// A remote endpoint that receives the arguments as a JSON POST body.
    Http {
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl ToolBackend {
    /// Shorthand for [`ToolBackend::Local`].
    pub fn local(name: impl Into<String>) -> Self {
        ToolBackend::Local { name: name.into() }
    }
}

/// An example invocation attached to tool documentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolExample {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Human-oriented documentation registered alongside a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocEntry {
    /// One-line summary; preferred over the tool description when present.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub examples: Vec<ToolExample>,
    #[serde(default)]
    pub external_refs: Vec<String>,
}

/// Lightweight description of a catalog entry, as returned by search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub id: String,
    pub namespace: String,
    pub name: String,
    /// Description truncated to [`SHORT_DESCRIPTION_LEN`] characters.
    pub short_description: String,
    /// Summary taken from the tool's [`DocEntry`], empty when undocumented.
    pub summary: String,
    pub category: String,
    /// Deduplicated and sorted.
    pub tags: Vec<String>,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
}

impl ToolSummary {
    /// Derives a summary from a tool and its optional documentation.
    pub fn from_tool(tool: &Tool, doc: Option<&DocEntry>) -> Self {
        let mut tags = tool.tags.clone();
        tags.sort();
        tags.dedup();

        Self {
            id: tool.id(),
            namespace: tool.namespace.clone(),
            name: tool.name.clone(),
            short_description: truncate(&tool.description, SHORT_DESCRIPTION_LEN),
            summary: doc.map(|d| d.summary.clone()).unwrap_or_default(),
            category: tool.category.clone(),
            tags,
            input_modes: tool.input_modes.clone(),
            output_modes: tool.output_modes.clone(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// How much of a tool's documentation to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Summary text only.
    Summary,
    /// Summary plus the tool definition (and therefore its schema).
    Schema,
    /// Everything: definition, notes, examples and references.
    Full,
}

/// Documentation resolved for one tool at a given [`DetailLevel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDoc {
    /// The tool definition; absent at [`DetailLevel::Summary`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ToolExample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<String>,
}
