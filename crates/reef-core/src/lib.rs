use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Project configuration shared across all reef crates
pub mod config;
pub mod outputs;

pub use config::{ConfigError, EnvironmentConfig, ProjectConfig};

/// A named deployment environment. Each environment owns at most one stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Stage,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Stage => "stage",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage" => Ok(Environment::Stage),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment '{other}': expected 'stage' or 'production'"
            )),
        }
    }
}

/// Deterministic stack name for one environment.
///
/// The name is derived once from stable identity and never regenerated:
/// the same project and environment always address the same stack.
pub fn stack_name(project_name: &str, project_id: &str, environment: Environment) -> String {
    format!("{project_name}-{project_id}-{environment}")
}

/// Environment variable names every deployed application requires.
///
/// The secrets-synchronization workflow refuses to reference the secret
/// store from the stack template until all of these have materialized.
pub const DEFAULT_VARIABLES: &[&str] = &[
    "APP_ENV",
    "APP_KEY",
    "CACHE_DRIVER",
    "DB_CONNECTION",
    "DB_HOST",
    "DB_PORT",
    "DB_DATABASE",
    "LOG_CHANNEL",
    "QUEUE_CONNECTION",
    "MAIL_DRIVER",
    "AWS_DEFAULT_REGION",
    "REDIS_HOST",
    "REDIS_PORT",
    "SQS_QUEUE",
    "AWS_BUCKET",
];

/// Database schema name for one environment: dashes in the project name
/// are not valid in schema identifiers.
pub fn database_name(project_name: &str, environment: Environment) -> String {
    format!("{}_{}", project_name.replace('-', "_"), environment)
}

/// The registrable root of a fully qualified domain: its last two labels.
/// Hosted zones are looked up by root, not by the full environment domain.
pub fn root_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        return domain.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trips_through_strings() {
        for env in [Environment::Stage, Environment::Production] {
            assert_eq!(env.as_str().parse::<Environment>().unwrap(), env);
        }
        assert!("prod".parse::<Environment>().is_err());
    }

    #[test]
    fn stack_name_is_stable() {
        assert_eq!(
            stack_name("shop", "x7k2", Environment::Production),
            "shop-x7k2-production"
        );
    }

    #[test]
    fn database_name_replaces_dashes() {
        assert_eq!(
            database_name("my-shop", Environment::Stage),
            "my_shop_stage"
        );
    }

    #[test]
    fn root_domain_keeps_the_last_two_labels() {
        assert_eq!(root_domain("stage.shop.example"), "shop.example");
        assert_eq!(root_domain("shop.example"), "shop.example");
        assert_eq!(root_domain("a.b.c.d.example"), "d.example");
    }
}
