//! Configuration module
//!
//! Engine settings come from three layers, later ones winning: a YAML or
//! JSON config file, the named environment selected inside that file, and
//! `TESTBED_*` environment variables.

mod env;
mod file;

pub use env::{EnvConfig, ENV_PREFIX};
pub use file::{ConfigFile, EnvironmentConfig};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::executor::{
    CloudStrategy, ExecutionStrategy, LocalStrategy, ParallelStrategy, RemoteStrategy,
    ResultPolicy,
};
use crate::http::RemoteTarget;
use crate::utils::{init_logger, LogLevel};

fn default_max_concurrent() -> usize {
    4
}

/// Which execution strategy a runner starts with
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StrategyConfig {
    #[default]
    Local,
    Parallel {
        #[serde(default = "default_max_concurrent")]
        max_concurrent: usize,
    },
    Remote {
        target: RemoteTarget,
    },
    Cloud {
        nodes: Vec<RemoteTarget>,
    },
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::Local => "local",
            StrategyConfig::Parallel { .. } => "parallel",
            StrategyConfig::Remote { .. } => "remote",
            StrategyConfig::Cloud { .. } => "cloud",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Local => {}
            StrategyConfig::Parallel { max_concurrent } => {
                if *max_concurrent == 0 {
                    bail!("Parallel strategy needs max_concurrent >= 1");
                }
            }
            StrategyConfig::Remote { target } => validate_target(target)?,
            StrategyConfig::Cloud { nodes } => {
                if nodes.is_empty() {
                    bail!("Cloud strategy needs at least one node");
                }
                for node in nodes {
                    validate_target(node)?;
                }
            }
        }
        Ok(())
    }

    /// Instantiate the configured strategy
    pub fn build(&self) -> Result<Arc<dyn ExecutionStrategy>> {
        self.validate()?;
        let strategy: Arc<dyn ExecutionStrategy> = match self {
            StrategyConfig::Local => Arc::new(LocalStrategy::new()),
            StrategyConfig::Parallel { max_concurrent } => {
                Arc::new(ParallelStrategy::new(*max_concurrent))
            }
            StrategyConfig::Remote { target } => Arc::new(RemoteStrategy::new(target.clone())?),
            StrategyConfig::Cloud { nodes } => Arc::new(CloudStrategy::new(nodes.clone())?),
        };
        Ok(strategy)
    }
}

fn validate_target(target: &RemoteTarget) -> Result<()> {
    if target.endpoint.trim().is_empty() {
        bail!("Remote target endpoint must not be empty");
    }
    target.runs_url()?;
    Ok(())
}

/// Engine configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-unit time budget; no limit when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_timeout_ms: Option<u64>,

    #[serde(default)]
    pub result_policy: ResultPolicy,

    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Applied by [`EngineConfig::init_logging`]; the runner never installs a logger
    #[serde(default)]
    pub log_level: LogLevel,
}

impl EngineConfig {
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.unit_timeout_ms == Some(0) {
            bail!("unit_timeout_ms must be greater than zero");
        }
        self.strategy.validate()
    }

    /// Install the global tracing subscriber at `log_level`.
    ///
    /// Returns `false` when the process already has one.
    pub fn init_logging(&self) -> bool {
        init_logger(self.log_level)
    }

    /// Resolve the layered configuration.
    ///
    /// The file is `path` when given, else `TESTBED_CONFIG`, else the first
    /// file found in the standard locations; no file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &EnvConfig::load()?)
    }

    pub fn load_with(path: Option<&Path>, env: &EnvConfig) -> Result<Self> {
        let file = match path
            .map(Path::to_path_buf)
            .or_else(|| env.config_file.as_ref().map(PathBuf::from))
            .or_else(ConfigFile::find)
        {
            Some(path) => {
                info!("Loading config from {}", path.display());
                ConfigFile::load(&path)?
            }
            None => ConfigFile::default(),
        };

        let mut config = file.resolve(env.environment.as_deref())?;
        env.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }
}
