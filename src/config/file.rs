//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{EngineConfig, StrategyConfig};
use crate::executor::ResultPolicy;
use crate::http::RemoteTarget;
use crate::utils::LogLevel;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./testbed.yaml",
    "./testbed.yml",
    "./testbed.json",
    "./.testbed/config.yaml",
    "~/.config/testbed/config.yaml",
    "~/.testbed.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Engine settings shared by every environment
    #[serde(default)]
    pub engine: EngineConfig,

    /// Environment-specific overrides
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            engine: EngineConfig::default(),
            environments: Vec::new(),
        }
    }
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            bail!("Unsupported config version: {}", self.version);
        }

        self.engine.validate()?;

        for (i, env) in self.environments.iter().enumerate() {
            if env.name.trim().is_empty() {
                bail!("Environment #{} has no name", i + 1);
            }
            if self.environments[..i].iter().any(|e| e.name == env.name) {
                bail!("Duplicate environment '{}'", env.name);
            }
            env.apply(&self.engine)
                .validate()
                .with_context(|| format!("Invalid environment '{}'", env.name))?;
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            engine: EngineConfig {
                unit_timeout_ms: Some(30_000),
                ..Default::default()
            },
            environments: vec![
                EnvironmentConfig::new("development").with_strategy(StrategyConfig::Parallel {
                    max_concurrent: 4,
                }),
                EnvironmentConfig::new("ci").with_strategy(StrategyConfig::Remote {
                    target: RemoteTarget::new("https://grid.example.com"),
                }),
                EnvironmentConfig::new("nightly").with_strategy(StrategyConfig::Cloud {
                    nodes: vec![
                        RemoteTarget::new("https://node-1.example.com"),
                        RemoteTarget::new("https://node-2.example.com"),
                    ],
                }),
            ],
        }
    }

    /// Get environment by name
    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Engine settings with the named environment's overrides applied
    pub fn resolve(&self, environment: Option<&str>) -> Result<EngineConfig> {
        match environment {
            None => Ok(self.engine.clone()),
            Some(name) => match self.environment(name) {
                Some(env) => Ok(env.apply(&self.engine)),
                None => bail!("Unknown environment '{}'", name),
            },
        }
    }
}

/// Environment-specific overrides; unset fields inherit the engine settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (e.g., "development", "ci")
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_policy: Option<ResultPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_unit_timeout_ms(mut self, ms: u64) -> Self {
        self.unit_timeout_ms = Some(ms);
        self
    }

    /// Overlay this environment on `base`
    pub fn apply(&self, base: &EngineConfig) -> EngineConfig {
        EngineConfig {
            unit_timeout_ms: self.unit_timeout_ms.or(base.unit_timeout_ms),
            result_policy: self.result_policy.unwrap_or(base.result_policy),
            strategy: self
                .strategy
                .clone()
                .unwrap_or_else(|| base.strategy.clone()),
            log_level: self.log_level.unwrap_or(base.log_level),
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_example_is_valid() {
        let config = ConfigFile::example();
        assert_eq!(config.environments.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let config = ConfigFile::example();

        for name in ["config.yaml", "nested/config.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();

            let loaded = ConfigFile::load(&path).unwrap();
            assert_eq!(loaded.version, config.version);
            assert_eq!(loaded.engine, config.engine);
            assert_eq!(loaded.environments, config.environments);
        }
    }

    #[test]
    fn test_resolve_environment() {
        let config = ConfigFile::example();

        let base = config.resolve(None).unwrap();
        assert_eq!(base.strategy, StrategyConfig::Local);

        let ci = config.resolve(Some("ci")).unwrap();
        assert_eq!(ci.strategy.name(), "remote");
        assert_eq!(ci.unit_timeout_ms, Some(30_000));

        assert!(config.resolve(Some("missing")).is_err());
    }

    #[test]
    fn test_validate_config() {
        let mut config = ConfigFile::default();
        config.version = "9.9".to_string();
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config
            .environments
            .push(EnvironmentConfig::new("broken").with_strategy(StrategyConfig::Cloud {
                nodes: Vec::new(),
            }));
        assert!(config.validate().is_err());

        let mut config = ConfigFile::default();
        config.environments.push(EnvironmentConfig::new("dup"));
        config.environments.push(EnvironmentConfig::new("dup"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "engine:\n  strategy:\n    kind: parallel\n    max_concurrent: 0\n")
            .unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
