//! Parameter reconciliation.
//!
//! The engine rejects requests that omit a known key, so every submission
//! carries one directive per key: either an explicit value or a
//! use-previous marker. Create mode requires explicit values everywhere;
//! update mode keeps identity, immutable infrastructure facts and the
//! currently running images on their previous values unconditionally.

use crate::error::{OrchestratorError, Result};
use reef_core::Environment;
use serde::Serialize;

/// One configuration directive: a key carries a value or keeps its
/// previous one, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Parameter {
    Value { key: String, value: String },
    UsePrevious { key: String },
}

impl Parameter {
    pub fn value(key: &str, value: impl Into<String>) -> Self {
        Parameter::Value {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn use_previous(key: &str) -> Self {
        Parameter::UsePrevious {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Parameter::Value { key, .. } | Parameter::UsePrevious { key } => key,
        }
    }

    pub fn is_use_previous(&self) -> bool {
        matches!(self, Parameter::UsePrevious { .. })
    }
}

pub const KEY_ENABLED: &str = "Enabled";
pub const KEY_PROJECT_NAME: &str = "ProjectName";
pub const KEY_PROJECT_ID: &str = "ProjectId";
pub const KEY_ENVIRONMENT_NAME: &str = "EnvironmentName";
pub const KEY_DOMAIN_NAME: &str = "DomainName";
pub const KEY_ROOT_DOMAIN_NAME: &str = "RootDomainName";
pub const KEY_HOSTED_ZONE_ID: &str = "HostedZoneId";
pub const KEY_CERTIFICATE_ARN: &str = "CertificateArn";
pub const KEY_DB_STORAGE_SIZE: &str = "DbStorageSize";
pub const KEY_DB_INSTANCE_CLASS: &str = "DbInstanceClass";
pub const KEY_DB_AVAILABILITY_ZONE: &str = "DbAvailabilityZone";
pub const KEY_DB_ENGINE_VERSION: &str = "DbEngineVersion";
pub const KEY_DB_MASTER_USERNAME: &str = "DbMasterUsername";
pub const KEY_DB_MASTER_PASSWORD: &str = "DbMasterPassword";
pub const KEY_CACHE_NODE_TYPE: &str = "CacheNodeType";
pub const KEY_APPLICATION_IMAGE: &str = "ApplicationImage";
pub const KEY_WEBSERVER_IMAGE: &str = "WebserverImage";
pub const KEY_TASK_CPU: &str = "TaskCpu";
pub const KEY_TASK_MEMORY: &str = "TaskMemory";

/// Every key the template knows. A submission must cover all of them.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_ENABLED,
    KEY_PROJECT_NAME,
    KEY_PROJECT_ID,
    KEY_ENVIRONMENT_NAME,
    KEY_DOMAIN_NAME,
    KEY_ROOT_DOMAIN_NAME,
    KEY_HOSTED_ZONE_ID,
    KEY_CERTIFICATE_ARN,
    KEY_DB_STORAGE_SIZE,
    KEY_DB_INSTANCE_CLASS,
    KEY_DB_AVAILABILITY_ZONE,
    KEY_DB_ENGINE_VERSION,
    KEY_DB_MASTER_USERNAME,
    KEY_DB_MASTER_PASSWORD,
    KEY_CACHE_NODE_TYPE,
    KEY_APPLICATION_IMAGE,
    KEY_WEBSERVER_IMAGE,
    KEY_TASK_CPU,
    KEY_TASK_MEMORY,
];

/// Keys that update mode never mutates: project identity, immutable
/// infrastructure facts, and the images the environment is running.
pub const ALWAYS_USE_PREVIOUS: &[&str] = &[
    KEY_PROJECT_NAME,
    KEY_PROJECT_ID,
    KEY_ENVIRONMENT_NAME,
    KEY_DB_AVAILABILITY_ZONE,
    KEY_DB_ENGINE_VERSION,
    KEY_DB_MASTER_USERNAME,
    KEY_DB_MASTER_PASSWORD,
    KEY_APPLICATION_IMAGE,
    KEY_WEBSERVER_IMAGE,
];

/// Complete inputs for a stack creation. Every field is submitted as an
/// explicit value.
#[derive(Debug, Clone)]
pub struct CreateParams {
    pub enabled: bool,
    pub project_name: String,
    pub project_id: String,
    pub environment: Environment,
    pub domain: String,
    pub root_domain: String,
    pub hosted_zone_id: String,
    pub certificate_arn: String,
    pub db_storage_gb: u32,
    pub db_instance_class: String,
    pub db_availability_zone: String,
    pub db_engine_version: String,
    pub db_master_username: String,
    pub db_master_password: String,
    pub cache_node_type: String,
    pub application_image: String,
    pub webserver_image: String,
    pub task_cpu: String,
    pub task_memory: String,
}

impl CreateParams {
    /// Emits one explicit-value directive per known key, in known-key
    /// order. Empty required values are a caller contract violation.
    pub fn reconcile(&self) -> Result<Vec<Parameter>> {
        let pairs: Vec<(&str, String)> = vec![
            (KEY_ENABLED, self.enabled.to_string()),
            (KEY_PROJECT_NAME, self.project_name.clone()),
            (KEY_PROJECT_ID, self.project_id.clone()),
            (KEY_ENVIRONMENT_NAME, self.environment.to_string()),
            (KEY_DOMAIN_NAME, self.domain.clone()),
            (KEY_ROOT_DOMAIN_NAME, self.root_domain.clone()),
            (KEY_HOSTED_ZONE_ID, self.hosted_zone_id.clone()),
            (KEY_CERTIFICATE_ARN, self.certificate_arn.clone()),
            (KEY_DB_STORAGE_SIZE, self.db_storage_gb.to_string()),
            (KEY_DB_INSTANCE_CLASS, self.db_instance_class.clone()),
            (KEY_DB_AVAILABILITY_ZONE, self.db_availability_zone.clone()),
            (KEY_DB_ENGINE_VERSION, self.db_engine_version.clone()),
            (KEY_DB_MASTER_USERNAME, self.db_master_username.clone()),
            (KEY_DB_MASTER_PASSWORD, self.db_master_password.clone()),
            (KEY_CACHE_NODE_TYPE, self.cache_node_type.clone()),
            (KEY_APPLICATION_IMAGE, self.application_image.clone()),
            (KEY_WEBSERVER_IMAGE, self.webserver_image.clone()),
            (KEY_TASK_CPU, self.task_cpu.clone()),
            (KEY_TASK_MEMORY, self.task_memory.clone()),
        ];

        let mut parameters = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if value.is_empty() {
                return Err(OrchestratorError::Validation(format!(
                    "create requires an explicit value for parameter '{key}'"
                )));
            }
            parameters.push(Parameter::value(key, value));
        }

        Ok(parameters)
    }
}

/// Partial inputs for a stack update. `None` means "keep the previous
/// value".
#[derive(Debug, Clone, Default)]
pub struct UpdateParams {
    pub domain: Option<String>,
    pub root_domain: Option<String>,
    pub hosted_zone_id: Option<String>,
    pub certificate_arn: Option<String>,
    pub db_storage_gb: Option<u32>,
    pub db_instance_class: Option<String>,
    pub cache_node_type: Option<String>,
    pub task_cpu: Option<String>,
    pub task_memory: Option<String>,
}

impl UpdateParams {
    fn supplied(&self, key: &str) -> Option<String> {
        match key {
            KEY_DOMAIN_NAME => self.domain.clone(),
            KEY_ROOT_DOMAIN_NAME => self.root_domain.clone(),
            KEY_HOSTED_ZONE_ID => self.hosted_zone_id.clone(),
            KEY_CERTIFICATE_ARN => self.certificate_arn.clone(),
            KEY_DB_STORAGE_SIZE => self.db_storage_gb.map(|v| v.to_string()),
            KEY_DB_INSTANCE_CLASS => self.db_instance_class.clone(),
            KEY_CACHE_NODE_TYPE => self.cache_node_type.clone(),
            KEY_TASK_CPU => self.task_cpu.clone(),
            KEY_TASK_MEMORY => self.task_memory.clone(),
            _ => None,
        }
    }
}

/// Emits exactly one directive per known key for an update: the enabled
/// flag is always explicit, the always-use-previous set is never mutated,
/// and every remaining key takes the supplied value or keeps its previous
/// one.
pub fn reconcile_update(enabled: bool, changes: &UpdateParams) -> Vec<Parameter> {
    KNOWN_KEYS
        .iter()
        .map(|&key| {
            if key == KEY_ENABLED {
                return Parameter::value(key, enabled.to_string());
            }
            if ALWAYS_USE_PREVIOUS.contains(&key) {
                return Parameter::use_previous(key);
            }
            match changes.supplied(key) {
                Some(value) => Parameter::value(key, value),
                None => Parameter::use_previous(key),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn create_params() -> CreateParams {
        CreateParams {
            enabled: false,
            project_name: "shop".to_string(),
            project_id: "x7k2".to_string(),
            environment: Environment::Stage,
            domain: "stage.shop.example".to_string(),
            root_domain: "shop.example".to_string(),
            hosted_zone_id: "Z123".to_string(),
            certificate_arn: "arn:cloud:cert/abc".to_string(),
            db_storage_gb: 20,
            db_instance_class: "db.t3.small".to_string(),
            db_availability_zone: "us-east-1a".to_string(),
            db_engine_version: "8.0.25".to_string(),
            db_master_username: "uadmin".to_string(),
            db_master_password: "secret".to_string(),
            cache_node_type: "cache.t3.micro".to_string(),
            application_image: "repo/app:commit-1".to_string(),
            webserver_image: "repo/web:commit-1".to_string(),
            task_cpu: "256".to_string(),
            task_memory: "512".to_string(),
        }
    }

    #[test]
    fn create_emits_every_key_with_explicit_values() {
        let parameters = create_params().reconcile().unwrap();
        assert_eq!(parameters.len(), KNOWN_KEYS.len());
        for (parameter, key) in parameters.iter().zip(KNOWN_KEYS) {
            assert_eq!(parameter.key(), *key);
            assert!(!parameter.is_use_previous());
        }
    }

    #[test]
    fn create_rejects_missing_required_value() {
        let mut params = create_params();
        params.certificate_arn = String::new();
        let err = params.reconcile().unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn update_emits_exactly_one_directive_per_known_key() {
        let changes = UpdateParams {
            db_instance_class: Some("db.t3.medium".to_string()),
            cache_node_type: Some("cache.t3.small".to_string()),
            ..Default::default()
        };
        let parameters = reconcile_update(true, &changes);

        let keys: BTreeSet<&str> = parameters.iter().map(|p| p.key()).collect();
        assert_eq!(parameters.len(), KNOWN_KEYS.len());
        assert_eq!(keys.len(), KNOWN_KEYS.len());

        for parameter in &parameters {
            let key = parameter.key();
            let in_changes = changes.supplied(key).is_some();
            let pinned = ALWAYS_USE_PREVIOUS.contains(&key);
            if key == KEY_ENABLED {
                assert_eq!(parameter, &Parameter::value(KEY_ENABLED, "true"));
            } else {
                // use-previous iff not supplied or pinned
                assert_eq!(parameter.is_use_previous(), !in_changes || pinned);
            }
        }
    }

    #[test]
    fn update_never_mutates_pinned_keys() {
        // Pinned keys are not representable in UpdateParams at all.
        let parameters = reconcile_update(false, &UpdateParams::default());
        for key in ALWAYS_USE_PREVIOUS {
            let parameter = parameters.iter().find(|p| p.key() == *key).unwrap();
            assert!(parameter.is_use_previous());
        }
        let enabled = parameters.iter().find(|p| p.key() == KEY_ENABLED).unwrap();
        assert_eq!(enabled, &Parameter::value(KEY_ENABLED, "false"));
    }
}
