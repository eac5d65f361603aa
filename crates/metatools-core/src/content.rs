use serde::{Deserialize, Serialize};

/// A typed block of content in an invocation result or task artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
    },
}

impl Content {
    /// Creates a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Returns the text payload of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
        }
    }
}

/// The result of invoking a skill: an ordered sequence of content blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    pub content: Vec<Content>,
}

impl InvokeResult {
    /// A result holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_block_wire_shape() {
        let json = serde_json::to_value(Content::text("hi")).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn test_invoke_result_single_text() {
        let result = InvokeResult::text("ok");
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.content[0].as_text(), Some("ok"));
    }
}
