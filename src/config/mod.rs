//! Configuration management for lzc-dtl

pub mod schema;

pub use schema::{GlobalConfig, TimeoutConfig};

use crate::error::{DtlError, DtlResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration manager
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lzc-dtl")
            .join("config.json")
    }

    /// Load configuration, returning defaults if the file does not exist
    pub async fn load(&self) -> DtlResult<GlobalConfig> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
            DtlError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Load configuration, falling back to defaults on any read or parse failure
    pub async fn load_or_default(&self) -> GlobalConfig {
        match self.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Ignoring unreadable config {}: {}",
                    self.config_path.display(),
                    e
                );
                GlobalConfig::default()
            }
        }
    }

    /// Save configuration to file
    pub async fn save(&self, config: &GlobalConfig) -> DtlResult<()> {
        self.ensure_config_dir().await?;

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DtlError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> DtlResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DtlError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.json");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.container_cli, "docker");
        assert!(config.registry.is_none());
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let manager = ConfigManager::with_path(path);

        let config = GlobalConfig {
            registry: Some("reg.example.com".to_string()),
            ..GlobalConfig::default()
        };

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.registry.as_deref(), Some("reg.example.com"));
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let manager = ConfigManager::with_path(path);

        assert!(manager.load().await.is_err());
        let config = manager.load_or_default().await;
        assert_eq!(config.container_cli, "docker");
    }
}
