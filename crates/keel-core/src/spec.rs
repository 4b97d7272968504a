//! Service specification: the declarative input to the scheduler.
//!
//! A `ServiceSpec` is read from a TOML document and validated once. After
//! that it is treated as immutable; plan construction and storage-root
//! derivation only ever borrow it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse service spec: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid service spec: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Ordering policy applied to the children of a plan or phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One child at a time, in declaration order.
    #[default]
    Serial,
    /// Every incomplete child at once.
    Parallel,
}

/// Scheduler identity and coordination-store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub principal: String,
    pub principal_secret: Option<String>,
    /// Comma-separated `host:port` list of the coordination ensemble.
    pub coordination: String,
    /// Access credential in `user:password` form.
    pub coordination_credential: Option<String>,
    /// Overrides the storage root derived from the service name.
    pub coordination_root: Option<String>,
    pub user: Option<String>,
}

/// One pod type and how many instances of it to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(rename = "type")]
    pub pod_type: String,
    pub count: u32,
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Ordering of this pod's instances during deployment.
    #[serde(default)]
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub pods: Vec<PodSpec>,
    /// Ordering of pod types during deployment.
    #[serde(default)]
    pub deploy_strategy: StrategyKind,
}

impl ServiceSpec {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let spec: ServiceSpec = toml::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the invariants that parsing alone cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim_start_matches('/').is_empty() {
            return Err(ConfigError::Invalid("service name is empty".to_string()));
        }
        if self.scheduler.coordination.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "scheduler.coordination connection string is empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for pod in &self.pods {
            if !seen.insert(pod.pod_type.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate pod type '{}'",
                    pod.pod_type
                )));
            }
        }
        Ok(())
    }

    pub fn pod(&self, pod_type: &str) -> Option<&PodSpec> {
        self.pods.iter().find(|p| p.pod_type == pod_type)
    }
}
