//! Tool registry: the mapping from a client-facing tool name to a route
//! through the actor mesh, loaded once at startup from a TOML file
//! (teacher precedent: `config` + `toml` pairing for static configuration).

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// One tool's configured route and call options.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    /// The actor names a call to this tool is routed through, in order.
    pub actors: Vec<String>,
    #[serde(default)]
    pub required_args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default)]
    pub progress_enabled: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ToolDefinition {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Returns the first missing required argument, if any.
    pub fn missing_argument(&self, arguments: &serde_json::Value) -> Option<&str> {
        let object = arguments.as_object();
        self.required_args.iter().find_map(|name| {
            let present = object.map(|obj| obj.contains_key(name)).unwrap_or(false);
            if present {
                None
            } else {
                Some(name.as_str())
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawToolRegistry {
    #[serde(default)]
    tools: HashMap<String, ToolDefinition>,
}

/// The set of tools a gateway instance knows how to route calls for.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn from_toml_str(raw: &str) -> GatewayResult<Self> {
        let raw: RawToolRegistry =
            toml::from_str(raw).map_err(|err| GatewayError::Config(err.to_string()))?;
        Ok(Self { tools: raw.tools })
    }

    pub fn from_file(path: &str) -> GatewayResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| GatewayError::Config(err.to_string()))?;
        Self::from_toml_str(&raw)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [tools.summarize]
        actors = ["parse", "enrich", "summarize"]
        required_args = ["text"]
        default_timeout_secs = 10
        progress_enabled = true
    "#;

    #[test]
    fn parses_a_tool_definition() {
        let registry = ToolRegistry::from_toml_str(SAMPLE).unwrap();
        let tool = registry.get("summarize").unwrap();
        assert_eq!(tool.actors, vec!["parse", "enrich", "summarize"]);
        assert_eq!(tool.default_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn missing_argument_is_detected() {
        let registry = ToolRegistry::from_toml_str(SAMPLE).unwrap();
        let tool = registry.get("summarize").unwrap();
        assert_eq!(
            tool.missing_argument(&serde_json::json!({"other": 1})),
            Some("text")
        );
        assert_eq!(tool.missing_argument(&serde_json::json!({"text": "hi"})), None);
    }

    #[test]
    fn unknown_tool_is_absent() {
        let registry = ToolRegistry::from_toml_str(SAMPLE).unwrap();
        assert!(registry.get("nope").is_none());
    }
}
