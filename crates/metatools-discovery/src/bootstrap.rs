//! Startup registration of tools from a declarative file.
//!
//! File format (YAML; JSON is accepted as well):
//! ```yaml
//! tools:
//!   - tool:
//!       name: echo
//!       namespace: demo
//!       description: Echo the arguments back
//!       inputSchema: {type: object}
//!     backend:
//!       kind: local
//!       name: echo
//!     doc:
//!       summary: Returns its arguments
//! ```
//!
//! Any failure aborts the whole load; a half-registered catalog is never
//! served.

use crate::index::ToolIndex;
use metatools_core::{DocEntry, MetatoolsError, MetatoolsResult, Tool, ToolBackend};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One `(tool, backend, doc)` entry of a bootstrap file.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRegistration {
    pub tool: Tool,
    pub backend: ToolBackend,
    #[serde(default)]
    pub doc: Option<DocEntry>,
}

/// Parsed bootstrap document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapFile {
    #[serde(default)]
    pub tools: Vec<ToolRegistration>,
}

impl BootstrapFile {
    /// Parses a bootstrap document from text.
    pub fn parse(raw: &str) -> MetatoolsResult<Self> {
        serde_yaml_ng::from_str(raw)
            .map_err(|e| MetatoolsError::Config(format!("parse bootstrap file: {e}")))
    }

    /// Registers every entry into `index`, stopping at the first failure.
    pub fn register_all(self, index: &ToolIndex) -> MetatoolsResult<usize> {
        let mut registered = 0;
        for reg in self.tools {
            let id = reg.tool.id();
            index
                .register_tool(reg.tool, reg.backend, reg.doc)
                .map_err(|e| MetatoolsError::Registry(format!("register '{id}': {e}")))?;
            registered += 1;
        }
        Ok(registered)
    }
}

/// Reads `path` and registers its tools into `index`.
pub fn load_bootstrap(path: &Path, index: &ToolIndex) -> MetatoolsResult<usize> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MetatoolsError::Config(format!(
            "read bootstrap file {}: {e}",
            path.display()
        ))
    })?;
    let file = BootstrapFile::parse(&raw)?;
    let count = file.register_all(index)?;
    info!(path = %path.display(), count, "Bootstrap tools registered");
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_document() {
        let file = BootstrapFile::parse("tools: []").unwrap();
        assert!(file.tools.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_backend_kind() {
        let raw = r#"
tools:
  - tool: {name: x}
    backend: {kind: carrier-pigeon}
"#;
        assert!(BootstrapFile::parse(raw).is_err());
    }

    #[test]
    fn test_register_all_stops_on_invalid_tool() {
        let raw = r#"
tools:
  - tool: {name: good}
    backend: {kind: local, name: echo}
  - tool: {name: "bad name"}
    backend: {kind: local, name: echo}
"#;
        let index = ToolIndex::new();
        let err = BootstrapFile::parse(raw)
            .unwrap()
            .register_all(&index)
            .unwrap_err();
        assert!(err.to_string().contains("bad name"));
    }
}
