//! Shared command setup: configuration, provider wiring and the stack
//! service for the selected environment.

use anyhow::{Context as _, anyhow, bail};
use reef_core::{Environment, EnvironmentConfig, ProjectConfig};
use reef_provider_memory::{MemoryCloud, MemoryCloudOptions, providers};
use reef_runtime::{Providers, StackService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct CommandContext {
    pub config: ProjectConfig,
    pub environment: Environment,
    pub env_config: EnvironmentConfig,
    pub providers: Providers,
    pub stack: Arc<StackService>,
    pub template_path: PathBuf,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("env_config", &self.env_config)
            .field("template_path", &self.template_path)
            .finish_non_exhaustive()
    }
}

impl CommandContext {
    pub fn load(config_path: &Path, environment: Environment) -> anyhow::Result<Self> {
        let config = ProjectConfig::from_file(config_path)
            .with_context(|| format!("loading '{}'", config_path.display()))?;
        let env_config = config.environment(environment);

        let providers = build_providers(&config, environment, &env_config)?;
        let stack = Arc::new(StackService::new(
            Arc::clone(&providers.engine),
            &config.project_name,
            &config.project_id,
            environment,
        ));
        let template_path = PathBuf::from(&config.template);

        Ok(Self {
            config,
            environment,
            env_config,
            providers,
            stack,
            template_path,
        })
    }

    pub fn region(&self) -> anyhow::Result<String> {
        self.env_config.region.clone().ok_or_else(|| {
            anyhow!(
                "environment '{}' has no region configured",
                self.environment
            )
        })
    }

    pub fn domain(&self) -> anyhow::Result<String> {
        self.env_config.domain.clone().ok_or_else(|| {
            anyhow!(
                "environment '{}' has no domain configured",
                self.environment
            )
        })
    }
}

/// Providers are built for one environment: the secret store is scoped
/// to a per-environment path so operations like delete never touch the
/// other environment's parameters.
fn build_providers(
    config: &ProjectConfig,
    environment: Environment,
    env_config: &EnvironmentConfig,
) -> anyhow::Result<Providers> {
    let secret_path = format!(
        "/{}-{}/{}/",
        config.project_name, config.project_id, environment
    );
    match config.provider.as_str() {
        "memory" => {
            let mut options = MemoryCloudOptions::default().with_secret_path(&secret_path);
            if let Some(domain) = &env_config.domain {
                let root = reef_core::root_domain(domain);
                options = options.with_hosted_zone(&root, &format!("Z-{root}"));
            }
            Ok(providers(&Arc::new(MemoryCloud::new(options))))
        }
        other => bail!("unsupported provider '{other}' (only 'memory' is wired in)"),
    }
}
