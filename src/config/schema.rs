//! Configuration schema for lzc-dtl
//!
//! Configuration is stored at `~/.config/lzc-dtl/config.json`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Registry that retagged and built images are pushed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Container CLI used for pull/tag/push/build (docker or podman)
    pub container_cli: String,

    /// Optional `--platform` passed to pull and build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Limits for external commands
    pub timeouts: TimeoutConfig,

    /// Keys written by other tools or newer versions, kept on save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            registry: None,
            container_cli: "docker".to_string(),
            platform: None,
            timeouts: TimeoutConfig::default(),
            extra: Map::new(),
        }
    }
}

/// Per-command timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub build_secs: u64,
    pub pull_secs: u64,
    pub push_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            build_secs: 1800,
            pull_secs: 600,
            push_secs: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = GlobalConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"container_cli\": \"docker\""));
        assert!(json.contains("\"timeouts\""));
        assert!(!json.contains("registry"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: GlobalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.container_cli, "docker");
        assert_eq!(config.timeouts.build_secs, 1800);
    }

    #[test]
    fn config_deserializes_partial() {
        let json = r#"{ "registry": "reg.example.com", "timeouts": { "push_secs": 30 } }"#;
        let config: GlobalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.registry.as_deref(), Some("reg.example.com"));
        assert_eq!(config.timeouts.push_secs, 30);
        assert_eq!(config.timeouts.pull_secs, 600); // default preserved
    }

    #[test]
    fn unknown_keys_survive_roundtrip() {
        let json = r#"{ "registry": "r", "telemetry": false }"#;
        let config: GlobalConfig = serde_json::from_str(json).unwrap();
        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["telemetry"], Value::Bool(false));
    }
}
