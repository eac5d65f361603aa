//! Runtime configuration: defaults, an optional file, then environment
//! overrides.
//!
//! File format is chosen by extension: `.toml` is TOML, anything else
//! (`.yaml`, `.yml`, `.json`) is read as YAML.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8091
//!   basePath: /a2a
//! provider:
//!   name: metatools-a2a
//!   description: A2A server for discoverable tools
//! bootstrap:
//!   toolsFile: demos/tools.yaml
//!   maxSkills: 500
//! ```

use metatools_a2a::{normalize_base_path, ServerConfig, DEFAULT_MAX_SKILLS};
use metatools_core::{MetatoolsError, MetatoolsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "METATOOLS_A2A_CONFIG";

const ENV_PREFIX: &str = "METATOOLS_A2A_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub bootstrap: BootstrapSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Externally reachable URL of the JSON-RPC endpoint, when it differs
    /// from the bind address (e.g. behind a proxy).
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSection {
    #[serde(default)]
    pub tools_file: Option<PathBuf>,
    #[serde(default = "default_max_skills")]
    pub max_skills: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8091
}
fn default_base_path() -> String {
    "/a2a".to_string()
}
fn default_name() -> String {
    "metatools-a2a".to_string()
}
fn default_description() -> String {
    "A2A server for discoverable tools".to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_max_skills() -> i64 {
    DEFAULT_MAX_SKILLS as i64
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            public_url: None,
        }
    }
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            version: default_version(),
            documentation_url: None,
            icon_url: None,
        }
    }
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            tools_file: None,
            max_skills: default_max_skills(),
        }
    }
}

impl Config {
    /// Loads from `path` (or `METATOOLS_A2A_CONFIG`) and the process
    /// environment. Without a file, defaults plus environment are used.
    pub fn load(path: Option<&Path>) -> MetatoolsResult<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.finish();
        Ok(config)
    }

    /// Parses a config file. Does not consult the environment.
    pub fn from_file(path: &Path) -> MetatoolsResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MetatoolsError::Config(format!("read config {}: {e}", path.display()))
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let parsed: Result<Self, String> = if is_toml {
            toml::from_str(&raw).map_err(|e| e.to_string())
        } else {
            serde_yaml_ng::from_str(&raw).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| MetatoolsError::Config(format!("parse config {}: {e}", path.display())))
    }

    /// Overrides fields from `METATOOLS_A2A_*` variables resolved by `lookup`.
    ///
    /// Empty values are ignored, as are numbers that fail to parse.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.is_empty());

        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %v, error = %e, "Ignoring invalid METATOOLS_A2A_PORT"),
            }
        }
        if let Some(v) = get("BASE_PATH") {
            self.server.base_path = v;
        }
        if let Some(v) = get("PUBLIC_URL") {
            self.server.public_url = Some(v);
        }
        if let Some(v) = get("NAME") {
            self.provider.name = v;
        }
        if let Some(v) = get("DESCRIPTION") {
            self.provider.description = v;
        }
        if let Some(v) = get("VERSION") {
            self.provider.version = v;
        }
        if let Some(v) = get("DOCS_URL") {
            self.provider.documentation_url = Some(v);
        }
        if let Some(v) = get("ICON_URL") {
            self.provider.icon_url = Some(v);
        }
        if let Some(v) = get("TOOLS_FILE") {
            self.bootstrap.tools_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MAX_SKILLS") {
            match v.parse() {
                Ok(max) => self.bootstrap.max_skills = max,
                Err(e) => warn!(value = %v, error = %e, "Ignoring invalid METATOOLS_A2A_MAX_SKILLS"),
            }
        }
    }

    /// Applies command-line overrides, which beat file and environment.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    /// Canonicalizes values after all sources are merged.
    ///
    /// An empty host or a zero port counts as unset and takes the default.
    pub fn finish(&mut self) {
        if self.server.host.trim().is_empty() {
            self.server.host = default_host();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        self.server.base_path = normalize_base_path(&self.server.base_path);
    }

    /// External URL advertised in the agent card.
    pub fn base_url(&self) -> String {
        if let Some(url) = self.server.public_url.as_deref().filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        format!(
            "http://{}:{}{}",
            host_for_url(&self.server.host),
            self.server.port,
            self.server.base_path
        )
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            base_path: self.server.base_path.clone(),
        }
    }
}

/// Wildcard bind addresses are not reachable URLs.
fn host_for_url(host: &str) -> String {
    match host {
        "" | "0.0.0.0" | "::" | "[::]" => "localhost".to_string(),
        v6 if v6.contains(':') && !v6.starts_with('[') => format!("[{v6}]"),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8091);
        assert_eq!(config.server.base_path, "/a2a");
        assert_eq!(config.provider.name, "metatools-a2a");
        assert_eq!(config.bootstrap.max_skills, 500);
        assert!(config.bootstrap.tools_file.is_none());
        assert_eq!(config.base_url(), "http://localhost:8091/a2a");
    }

    #[test]
    fn test_yaml_file_partial_keeps_defaults() {
        let file = write_file(
            ".yaml",
            "server:\n  port: 9000\n  basePath: /agents\nbootstrap:\n  toolsFile: tools.yaml\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.base_path, "/agents");
        assert_eq!(config.bootstrap.tools_file, Some(PathBuf::from("tools.yaml")));
        assert_eq!(config.bootstrap.max_skills, 500);
        assert_eq!(config.provider.name, "metatools-a2a");
    }

    #[test]
    fn test_toml_file() {
        let file = write_file(
            ".toml",
            "[server]\nhost = \"127.0.0.1\"\n\n[provider]\nname = \"tools\"\ndocumentationUrl = \"https://example.com\"\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.name, "tools");
        assert_eq!(
            config.provider.documentation_url.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_json_file_read_as_yaml() {
        let file = write_file(".json", r#"{"provider": {"version": "2.0.0"}}"#);
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.provider.version, "2.0.0");
    }

    #[test]
    fn test_missing_and_malformed_files_fail() {
        let err = Config::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, MetatoolsError::Config(ref m) if m.starts_with("read config")));

        let file = write_file(".yaml", "server: [not, a, map]");
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, MetatoolsError::Config(ref m) if m.starts_with("parse config")));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_file(".yaml", "server:\n  port: 9000\nprovider:\n  name: from-file\n");
        let mut config = Config::from_file(file.path()).unwrap();
        config.apply_env(env(&[
            ("METATOOLS_A2A_PORT", "9100"),
            ("METATOOLS_A2A_NAME", "from-env"),
            ("METATOOLS_A2A_TOOLS_FILE", "/etc/tools.yaml"),
            ("METATOOLS_A2A_MAX_SKILLS", "25"),
            ("METATOOLS_A2A_ICON_URL", "https://example.com/i.png"),
        ]));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.provider.name, "from-env");
        assert_eq!(config.bootstrap.tools_file, Some(PathBuf::from("/etc/tools.yaml")));
        assert_eq!(config.bootstrap.max_skills, 25);
        assert_eq!(config.provider.icon_url.as_deref(), Some("https://example.com/i.png"));
    }

    #[test]
    fn test_env_ignores_empty_and_unparsable() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("METATOOLS_A2A_PORT", "eighty"),
            ("METATOOLS_A2A_MAX_SKILLS", "lots"),
            ("METATOOLS_A2A_HOST", ""),
        ]));
        assert_eq!(config.server.port, 8091);
        assert_eq!(config.bootstrap.max_skills, 500);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = Config::default();
        config.apply_env(env(&[("METATOOLS_A2A_HOST", "10.0.0.1")]));
        config.apply_overrides(Some("127.0.0.1".into()), Some(1234));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.server_config().addr(), "127.0.0.1:1234");
    }

    #[test]
    fn test_base_path_normalized_and_url() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("METATOOLS_A2A_BASE_PATH", "agents/"),
            ("METATOOLS_A2A_HOST", "10.1.2.3"),
        ]));
        config.finish();
        assert_eq!(config.server.base_path, "/agents");
        assert_eq!(config.base_url(), "http://10.1.2.3:8091/agents");
    }

    #[test]
    fn test_public_url_wins() {
        let mut config = Config::default();
        config.server.public_url = Some("https://agents.example.com/a2a/".into());
        assert_eq!(config.base_url(), "https://agents.example.com/a2a");
    }

    #[test]
    fn test_host_for_url() {
        assert_eq!(host_for_url(""), "localhost");
        assert_eq!(host_for_url("0.0.0.0"), "localhost");
        assert_eq!(host_for_url("::"), "localhost");
        assert_eq!(host_for_url("::1"), "[::1]");
        assert_eq!(host_for_url("example.com"), "example.com");
    }

    #[test]
    fn test_zero_host_and_port_take_defaults() {
        let file = write_file(".yaml", "server:\n  host: \"\"\n  port: 0\n  basePath: \"\"\n");
        let mut config = Config::from_file(file.path()).unwrap();
        config.finish();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8091);
        assert_eq!(config.server.base_path, "/a2a");
        assert_eq!(config.server_config().addr(), "0.0.0.0:8091");
        assert_eq!(config.base_url(), "http://localhost:8091/a2a");
    }

    #[test]
    fn test_zero_port_override_takes_default() {
        let mut config = Config::default();
        config.apply_overrides(Some(String::new()), Some(0));
        config.finish();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8091);
    }
}
