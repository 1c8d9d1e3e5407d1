//! Project configuration loaded from `reef.yaml`.
//!
//! The file carries project identity plus per-environment settings. It
//! never stores credentials: generated database credentials live only in
//! the stack's parameter set, and application secrets live in the secret
//! store.

use crate::Environment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at '{0}'")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Per-environment settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Cloud region the environment deploys into. Required before any
    /// stack operation.
    #[serde(default)]
    pub region: Option<String>,

    /// Fully qualified domain the environment serves.
    #[serde(default)]
    pub domain: Option<String>,

    /// Environment variable names the application requires. Empty means
    /// the default catalog.
    #[serde(default)]
    pub variables: Vec<String>,
}

impl EnvironmentConfig {
    /// The required variable name set, falling back to the default
    /// catalog when none are configured.
    pub fn required_variables(&self) -> Vec<String> {
        if self.variables.is_empty() {
            crate::DEFAULT_VARIABLES.iter().map(|s| s.to_string()).collect()
        } else {
            self.variables.clone()
        }
    }
}

/// Complete project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, part of every stack name.
    pub project_name: String,

    /// Short stable project identifier, part of every stack name.
    pub project_id: String,

    /// Path to the declarative infrastructure template.
    #[serde(default = "default_template_path")]
    pub template: String,

    /// Which provider backs the collaborators. Only "memory" is wired in
    /// the CLI today.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Per-environment settings keyed by environment name.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

fn default_template_path() -> String {
    ".reef/infrastructure.yml".to_string()
}

fn default_provider() -> String {
    "memory".to_string()
}

impl ProjectConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn environment(&self, environment: Environment) -> EnvironmentConfig {
        self.environments
            .get(environment.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn stack_name(&self, environment: Environment) -> String {
        crate::stack_name(&self.project_name, &self.project_id, environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reef.yaml");
        fs::write(
            &path,
            r#"
project_name: shop
project_id: x7k2
environments:
  stage:
    region: us-east-1
    domain: stage.shop.example
"#,
        )
        .unwrap();

        let cfg = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(cfg.project_name, "shop");
        assert_eq!(cfg.template, ".reef/infrastructure.yml");
        assert_eq!(cfg.provider, "memory");

        let stage = cfg.environment(Environment::Stage);
        assert_eq!(stage.region.as_deref(), Some("us-east-1"));
        assert_eq!(stage.required_variables().len(), crate::DEFAULT_VARIABLES.len());

        let production = cfg.environment(Environment::Production);
        assert!(production.region.is_none());
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ProjectConfig::from_file("/nonexistent/reef.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
