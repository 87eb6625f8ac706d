//! Environment variable configuration
//!
//! Provides `TESTBED_*` overrides applied on top of the file configuration.

use anyhow::{bail, Context, Result};
use std::env;

use super::{default_max_concurrent, EngineConfig, StrategyConfig};
use crate::http::RemoteTarget;
use crate::utils::LogLevel;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TESTBED";

/// Configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Per-unit timeout from TESTBED_TIMEOUT_MS; `0` disables the limit
    pub unit_timeout_ms: Option<u64>,
    /// Strategy kind from TESTBED_STRATEGY
    pub strategy: Option<String>,
    /// Remote endpoint(s) from TESTBED_ENDPOINT, comma separated for cloud
    pub endpoint: Option<String>,
    /// Credentials from TESTBED_API_KEY
    pub api_key: Option<String>,
    /// Worker count from TESTBED_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// Environment name from TESTBED_ENV
    pub environment: Option<String>,
    /// Config file from TESTBED_CONFIG
    pub config_file: Option<String>,
    /// Log level from TESTBED_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            unit_timeout_ms: parse(&get, "TIMEOUT_MS")?,
            strategy: get("STRATEGY"),
            endpoint: get("ENDPOINT"),
            api_key: get("API_KEY"),
            max_concurrent: parse(&get, "MAX_CONCURRENT")?,
            environment: get("ENV"),
            config_file: get("CONFIG"),
            log_level: get("LOG"),
        })
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.unit_timeout_ms.is_some()
            || self.strategy.is_some()
            || self.endpoint.is_some()
            || self.api_key.is_some()
            || self.max_concurrent.is_some()
            || self.environment.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
    }

    /// Apply the overrides to `config`
    pub fn apply(&self, config: &mut EngineConfig) -> Result<()> {
        if let Some(ms) = self.unit_timeout_ms {
            config.unit_timeout_ms = (ms > 0).then_some(ms);
        }

        if let Some(level) = &self.log_level {
            config.log_level = LogLevel::from_str(level)
                .with_context(|| format!("Invalid {ENV_PREFIX}_LOG: {level}"))?;
        }

        if let Some(kind) = &self.strategy {
            config.strategy = self.strategy_of_kind(kind, &config.strategy)?;
        }

        match &mut config.strategy {
            StrategyConfig::Local => {}
            StrategyConfig::Parallel { max_concurrent } => {
                if let Some(n) = self.max_concurrent {
                    *max_concurrent = n;
                }
            }
            StrategyConfig::Remote { target } => {
                if let Some(endpoint) = self.endpoints().into_iter().next() {
                    target.endpoint = endpoint;
                }
                if let Some(key) = &self.api_key {
                    target.api_key = Some(key.clone());
                }
            }
            StrategyConfig::Cloud { nodes } => {
                let endpoints = self.endpoints();
                if !endpoints.is_empty() {
                    *nodes = endpoints.into_iter().map(RemoteTarget::new).collect();
                }
                if let Some(key) = &self.api_key {
                    for node in nodes.iter_mut() {
                        node.api_key = Some(key.clone());
                    }
                }
            }
        }

        Ok(())
    }

    /// Strategy selected by TESTBED_STRATEGY, keeping compatible settings of `current`
    fn strategy_of_kind(&self, kind: &str, current: &StrategyConfig) -> Result<StrategyConfig> {
        let strategy = match (kind.to_lowercase().as_str(), current) {
            ("local", _) => StrategyConfig::Local,
            ("parallel", StrategyConfig::Parallel { .. }) => current.clone(),
            ("parallel", _) => StrategyConfig::Parallel {
                max_concurrent: default_max_concurrent(),
            },
            ("remote", StrategyConfig::Remote { .. }) => current.clone(),
            ("remote", _) => match self.endpoints().into_iter().next() {
                Some(endpoint) => StrategyConfig::Remote {
                    target: RemoteTarget::new(endpoint),
                },
                None => bail!("{ENV_PREFIX}_STRATEGY=remote requires {ENV_PREFIX}_ENDPOINT"),
            },
            ("cloud", StrategyConfig::Cloud { .. }) => current.clone(),
            ("cloud", _) => {
                let endpoints = self.endpoints();
                if endpoints.is_empty() {
                    bail!("{ENV_PREFIX}_STRATEGY=cloud requires {ENV_PREFIX}_ENDPOINT");
                }
                StrategyConfig::Cloud {
                    nodes: endpoints.into_iter().map(RemoteTarget::new).collect(),
                }
            }
            (other, _) => bail!("Invalid {ENV_PREFIX}_STRATEGY: {other}"),
        };
        Ok(strategy)
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoint
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse<T, G>(get: &G, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|v| {
            v.parse()
                .with_context(|| format!("Invalid {ENV_PREFIX}_{name}: {v}"))
        })
        .transpose()
}
