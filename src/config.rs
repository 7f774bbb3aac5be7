//! Runtime configuration for graphs and the indexes they build

use crate::index::MaintenancePolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Graph configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    /// Policy of the join indexes created by `Graph::pairs`
    pub index_policy: MaintenancePolicy,
    /// Assert forward/inverse consistency after every graph mutation
    pub verify_invariants: bool,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            index_policy: MaintenancePolicy::Incremental,
            verify_invariants: cfg!(debug_assertions),
        }
    }
}

impl RelationConfig {
    /// Parse a YAML (or JSON) document; missing fields take their defaults
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }
}
