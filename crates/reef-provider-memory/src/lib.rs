//! In-memory implementation of every collaborator trait.
//!
//! One [`MemoryCloud`] instance plays all the remote parts: the stack
//! engine, the certificate authority, DNS, the secret store, allow-lists,
//! the task runner, the database and the address resolver. Remote
//! asynchrony is simulated with per-resource poll countdowns, so the
//! orchestrator's retry loops run against genuinely eventually-consistent
//! behavior without touching a network.

use async_trait::async_trait;
use reef_core::outputs;
use reef_runtime::params::{self, Parameter};
use reef_runtime::provider::{
    AddressResolver, AllowListEntry, CertificateAuthority, CertificateRequest, CloudEngine,
    DatabaseAdmin, DnsRecord, DnsZones, NetworkAllowList, ProviderError, ProviderResult,
    Providers, SecretStore, StackDescription, StackRequest, TaskLaunch, TaskRunner,
};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const CREATE_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
const CREATE_COMPLETE: &str = "CREATE_COMPLETE";
const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
const UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";
const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";

/// Poll countdowns and failure knobs. Every `*_polls` field is the number
/// of observations a resource reports "still in progress" before settling.
#[derive(Debug, Clone)]
pub struct MemoryCloudOptions {
    pub stack_transition_polls: u32,
    pub output_publish_polls: u32,
    pub dns_sync_polls: u32,
    pub certificate_polls: u32,
    pub secret_list_polls: u32,
    /// Path prefix prepended to every stored parameter name, so one store
    /// can hold several environments without their names colliding.
    pub secret_path_prefix: String,
    pub allow_list_settle_polls: u32,
    pub task_run_polls: u32,
    /// Number of allow-list mutations to reject with a stale version
    /// before accepting, simulating a concurrent writer.
    pub stale_rejections: u32,
    pub fail_schema_creation: bool,
    pub operator_address: IpAddr,
    /// Root domain to hosted zone id.
    pub hosted_zones: BTreeMap<String, String>,
}

impl Default for MemoryCloudOptions {
    fn default() -> Self {
        Self {
            stack_transition_polls: 2,
            output_publish_polls: 1,
            dns_sync_polls: 1,
            certificate_polls: 1,
            secret_list_polls: 1,
            secret_path_prefix: String::new(),
            allow_list_settle_polls: 1,
            task_run_polls: 2,
            stale_rejections: 0,
            fail_schema_creation: false,
            operator_address: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)),
            hosted_zones: BTreeMap::new(),
        }
    }
}

impl MemoryCloudOptions {
    pub fn with_hosted_zone(mut self, root_domain: &str, zone_id: &str) -> Self {
        self.hosted_zones
            .insert(root_domain.to_string(), zone_id.to_string());
        self
    }

    pub fn with_secret_path(mut self, prefix: &str) -> Self {
        self.secret_path_prefix = prefix.to_string();
        self
    }
}

struct PendingTransition {
    visible_status: &'static str,
    remaining: u32,
    /// `None` means the stack disappears instead of settling.
    target: Option<&'static str>,
}

struct StackRecord {
    parameters: Vec<Parameter>,
    template_body: String,
    status: String,
    pending: Option<PendingTransition>,
    outputs_remaining: u32,
    revision: u32,
}

struct CertRecord {
    record_name: String,
    validated: bool,
    polls_remaining: u32,
}

struct SecretRecord {
    value: String,
    lists_remaining: u32,
}

struct ListRecord {
    entries: Vec<AllowListEntry>,
    version: u64,
    state: &'static str,
    settle_remaining: u32,
}

struct TaskRecord {
    cluster: String,
    polls_remaining: u32,
}

/// One schema-creation call, recorded verbatim for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSchema {
    pub host: String,
    pub port: String,
    pub username: String,
    pub name: String,
}

#[derive(Default)]
struct State {
    stacks: BTreeMap<String, StackRecord>,
    certificates: BTreeMap<String, CertRecord>,
    dns_changes: BTreeMap<String, u32>,
    dns_records: Vec<DnsRecord>,
    secrets: BTreeMap<String, SecretRecord>,
    allow_lists: BTreeMap<String, ListRecord>,
    tasks: BTreeMap<String, TaskRecord>,
    task_launches: Vec<TaskLaunch>,
    schemas: Vec<CreatedSchema>,
    stale_rejections_remaining: u32,
    sequence: u64,
}

pub struct MemoryCloud {
    options: MemoryCloudOptions,
    state: Mutex<State>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new(MemoryCloudOptions::default())
    }
}

impl MemoryCloud {
    pub fn new(options: MemoryCloudOptions) -> Self {
        let state = State {
            stale_rejections_remaining: options.stale_rejections,
            ..State::default()
        };
        Self {
            options,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(state: &mut State) -> u64 {
        state.sequence += 1;
        state.sequence
    }

    fn secret_key(&self, name: &str) -> String {
        format!("{}{name}", self.options.secret_path_prefix)
    }

    // Inspection surface for tests.

    pub fn stack_exists(&self, name: &str) -> bool {
        self.state().stacks.contains_key(name)
    }

    pub fn stack_parameters(&self, name: &str) -> Option<Vec<Parameter>> {
        self.state().stacks.get(name).map(|r| r.parameters.clone())
    }

    pub fn stack_template(&self, name: &str) -> Option<String> {
        self.state().stacks.get(name).map(|r| r.template_body.clone())
    }

    pub fn schemas(&self) -> Vec<CreatedSchema> {
        self.state().schemas.clone()
    }

    pub fn task_launches(&self) -> Vec<TaskLaunch> {
        self.state().task_launches.clone()
    }

    pub fn allow_list_entries(&self, id: &str) -> Vec<AllowListEntry> {
        self.state()
            .allow_lists
            .get(id)
            .map(|r| r.entries.clone())
            .unwrap_or_default()
    }

    pub fn secret_value(&self, name: &str) -> Option<String> {
        self.state()
            .secrets
            .get(&self.secret_key(name))
            .map(|r| r.value.clone())
    }

    /// Full stored parameter paths, prefix included.
    pub fn secret_names(&self) -> Vec<String> {
        self.state().secrets.keys().cloned().collect()
    }

    fn synthesize_outputs(&self, name: &str, record: &StackRecord) -> BTreeMap<String, String> {
        let domain = record
            .parameters
            .iter()
            .find_map(|p| match p {
                Parameter::Value { key, value } if key == params::KEY_DOMAIN_NAME => {
                    Some(value.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| format!("{name}.example"));

        BTreeMap::from(
            [
                (outputs::DOMAIN_NAME, domain),
                (outputs::DB_HOST, format!("{name}-db.internal")),
                (outputs::DB_PORT, "3306".to_string()),
                (
                    outputs::DB_ADMIN_ACCESS_PREFIX_LIST_ID,
                    format!("pl-admin-{name}"),
                ),
                (outputs::APP_ACCESS_PREFIX_LIST_ID, format!("pl-app-{name}")),
                (
                    outputs::CACHE_ENDPOINT_ADDRESS,
                    format!("{name}-cache.internal"),
                ),
                (outputs::CACHE_ENDPOINT_PORT, "6379".to_string()),
                (outputs::QUEUE_URL, format!("https://queue.example/{name}")),
                (outputs::BUCKET_NAME, format!("{name}-bucket")),
                (outputs::DB_SECURITY_GROUP_ID, format!("sg-db-{name}")),
                (
                    outputs::CONTAINERS_SECURITY_GROUP_ID,
                    format!("sg-containers-{name}"),
                ),
                (outputs::CACHE_SECURITY_GROUP_ID, format!("sg-cache-{name}")),
                (
                    outputs::MIGRATE_TASK_DEFINITION_ARN,
                    format!("arn:cloud:task-definition/{name}-migrate:{}", record.revision),
                ),
                (outputs::CONTAINER_CLUSTER_ARN, format!("arn:cloud:cluster/{name}")),
                (outputs::SUBNET_1_ID, "subnet-1".to_string()),
            ]
            .map(|(key, value)| (key.to_string(), value)),
        )
    }

    /// Resolves use-previous directives against the currently stored
    /// parameter set, the way a real engine would.
    fn resolve_parameters(
        previous: &[Parameter],
        submitted: Vec<Parameter>,
    ) -> ProviderResult<Vec<Parameter>> {
        submitted
            .into_iter()
            .map(|parameter| match parameter {
                Parameter::Value { .. } => Ok(parameter),
                Parameter::UsePrevious { key } => previous
                    .iter()
                    .find(|p| p.key() == key)
                    .cloned()
                    .ok_or_else(|| {
                        ProviderError::Remote(format!(
                            "parameter '{key}' has no previous value to keep"
                        ))
                    }),
            })
            .collect()
    }
}

#[async_trait]
impl CloudEngine for MemoryCloud {
    async fn create_stack(&self, request: StackRequest) -> ProviderResult<()> {
        let mut state = self.state();
        if state.stacks.contains_key(&request.name) {
            return Err(ProviderError::Remote(format!(
                "stack '{}' already exists",
                request.name
            )));
        }

        debug!(stack = %request.name, "creating stack");
        state.stacks.insert(
            request.name,
            StackRecord {
                parameters: request.parameters,
                template_body: request.template_body,
                status: CREATE_IN_PROGRESS.to_string(),
                pending: Some(PendingTransition {
                    visible_status: CREATE_IN_PROGRESS,
                    remaining: self.options.stack_transition_polls,
                    target: Some(CREATE_COMPLETE),
                }),
                outputs_remaining: self.options.output_publish_polls,
                revision: 1,
            },
        );
        Ok(())
    }

    async fn update_stack(&self, request: StackRequest) -> ProviderResult<()> {
        let mut state = self.state();
        let record = state
            .stacks
            .get_mut(&request.name)
            .ok_or_else(|| ProviderError::NotFound(format!("stack '{}'", request.name)))?;

        debug!(stack = %request.name, "updating stack");
        record.parameters = Self::resolve_parameters(&record.parameters, request.parameters)?;
        record.template_body = request.template_body;
        record.pending = Some(PendingTransition {
            visible_status: UPDATE_IN_PROGRESS,
            remaining: self.options.stack_transition_polls,
            target: Some(UPDATE_COMPLETE),
        });
        record.outputs_remaining = self.options.output_publish_polls;
        Ok(())
    }

    async fn delete_stack(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.state();
        let record = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("stack '{name}'")))?;

        debug!(stack = %name, "deleting stack");
        record.pending = Some(PendingTransition {
            visible_status: DELETE_IN_PROGRESS,
            remaining: self.options.stack_transition_polls,
            target: None,
        });
        Ok(())
    }

    async fn describe_stack(&self, name: &str) -> ProviderResult<StackDescription> {
        let mut state = self.state();

        let settled_target = {
            let record = state
                .stacks
                .get_mut(name)
                .ok_or_else(|| ProviderError::NotFound(format!("stack '{name}'")))?;
            match &mut record.pending {
                Some(pending) if pending.remaining > 0 => {
                    pending.remaining -= 1;
                    return Ok(StackDescription {
                        status: pending.visible_status.to_string(),
                        outputs: BTreeMap::new(),
                    });
                }
                Some(pending) => Some(pending.target),
                None => None,
            }
        };

        match settled_target {
            // Deletion settles by removal.
            Some(None) => {
                state.stacks.remove(name);
                return Err(ProviderError::NotFound(format!("stack '{name}'")));
            }
            Some(Some(target)) => {
                if let Some(record) = state.stacks.get_mut(name) {
                    record.status = target.to_string();
                    if target == UPDATE_COMPLETE {
                        record.revision += 1;
                    }
                    record.pending = None;
                }
            }
            None => {}
        }

        let record = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| ProviderError::NotFound(format!("stack '{name}'")))?;
        if record.outputs_remaining > 0 {
            record.outputs_remaining -= 1;
            return Ok(StackDescription {
                status: record.status.clone(),
                outputs: BTreeMap::new(),
            });
        }

        let outputs = self.synthesize_outputs(name, record);
        Ok(StackDescription {
            status: record.status.clone(),
            outputs,
        })
    }
}

#[async_trait]
impl CertificateAuthority for MemoryCloud {
    async fn request_certificate(&self, domain: &str) -> ProviderResult<CertificateRequest> {
        let mut state = self.state();
        let id = Self::next_id(&mut state);
        let arn = format!("arn:cloud:cert/{id}");
        let record_name = format!("_validate.{domain}");

        state.certificates.insert(
            arn.clone(),
            CertRecord {
                record_name: record_name.clone(),
                validated: false,
                polls_remaining: self.options.certificate_polls,
            },
        );

        Ok(CertificateRequest {
            arn,
            validation_record: DnsRecord {
                name: record_name,
                record_type: "CNAME".to_string(),
                value: format!("_{id}.validation.example"),
            },
        })
    }

    async fn certificate_status(&self, arn: &str) -> ProviderResult<String> {
        let mut state = self.state();
        let record = state
            .certificates
            .get_mut(arn)
            .ok_or_else(|| ProviderError::NotFound(format!("certificate '{arn}'")))?;

        if !record.validated {
            return Ok("PENDING_VALIDATION".to_string());
        }
        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return Ok("PENDING_VALIDATION".to_string());
        }
        Ok("ISSUED".to_string())
    }
}

#[async_trait]
impl DnsZones for MemoryCloud {
    async fn hosted_zone_id(&self, root_domain: &str) -> ProviderResult<Option<String>> {
        Ok(self.options.hosted_zones.get(root_domain).cloned())
    }

    async fn upsert_records(
        &self,
        _zone_id: &str,
        records: &[DnsRecord],
    ) -> ProviderResult<String> {
        let mut state = self.state();
        for record in records {
            for cert in state.certificates.values_mut() {
                if cert.record_name == record.name {
                    cert.validated = true;
                }
            }
            state.dns_records.push(record.clone());
        }

        let id = Self::next_id(&mut state);
        let change_id = format!("change-{id}");
        state
            .dns_changes
            .insert(change_id.clone(), self.options.dns_sync_polls);
        Ok(change_id)
    }

    async fn change_status(&self, change_id: &str) -> ProviderResult<String> {
        let mut state = self.state();
        let remaining = state
            .dns_changes
            .get_mut(change_id)
            .ok_or_else(|| ProviderError::NotFound(format!("DNS change '{change_id}'")))?;

        if *remaining > 0 {
            *remaining -= 1;
            return Ok("PENDING".to_string());
        }
        Ok("INSYNC".to_string())
    }
}

/// Parameters are stored under their full path; the trait surface works in
/// names relative to the configured prefix, so callers stay unaware of how
/// the store scopes one environment from another.
#[async_trait]
impl SecretStore for MemoryCloud {
    async fn put_parameter(&self, name: &str, value: &str) -> ProviderResult<()> {
        self.state().secrets.insert(
            self.secret_key(name),
            SecretRecord {
                value: value.to_string(),
                lists_remaining: self.options.secret_list_polls,
            },
        );
        Ok(())
    }

    async fn delete_parameter(&self, name: &str) -> ProviderResult<()> {
        self.state()
            .secrets
            .remove(&self.secret_key(name))
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("parameter '{name}'")))
    }

    async fn list_parameters(&self) -> ProviderResult<Vec<String>> {
        let prefix = &self.options.secret_path_prefix;
        Ok(self
            .state()
            .secrets
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect())
    }

    async fn list_parameter_arns(&self) -> ProviderResult<BTreeMap<String, String>> {
        let prefix = &self.options.secret_path_prefix;
        let mut state = self.state();
        let mut arns = BTreeMap::new();
        for (key, record) in &mut state.secrets {
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if record.lists_remaining > 0 {
                record.lists_remaining -= 1;
                continue;
            }
            arns.insert(
                name.to_string(),
                format!("arn:cloud:param/{}", key.trim_start_matches('/')),
            );
        }
        Ok(arns)
    }
}

impl MemoryCloud {
    fn list_mut<'a>(&self, state: &'a mut State, id: &str) -> &'a mut ListRecord {
        state
            .allow_lists
            .entry(id.to_string())
            .or_insert_with(|| ListRecord {
                entries: Vec::new(),
                version: 1,
                state: "create-complete",
                settle_remaining: 0,
            })
    }

    /// Simulated concurrent writer: bumps the version under the caller.
    fn maybe_reject_stale(state: &mut State, id: &str, submitted: u64) -> Option<ProviderError> {
        if state.stale_rejections_remaining == 0 {
            return None;
        }
        state.stale_rejections_remaining -= 1;
        let record = state.allow_lists.get_mut(id)?;
        record.version += 1;
        Some(ProviderError::StaleVersion {
            submitted,
            current: record.version,
        })
    }
}

#[async_trait]
impl NetworkAllowList for MemoryCloud {
    async fn describe_list(&self, id: &str) -> ProviderResult<(Vec<AllowListEntry>, u64)> {
        let mut state = self.state();
        let record = self.list_mut(&mut state, id);
        Ok((record.entries.clone(), record.version))
    }

    async fn add_entry(
        &self,
        id: &str,
        version: u64,
        entry: AllowListEntry,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        let settle_polls = self.options.allow_list_settle_polls;
        {
            let record = self.list_mut(&mut state, id);
            if record.version != version {
                return Err(ProviderError::StaleVersion {
                    submitted: version,
                    current: record.version,
                });
            }
        }
        if let Some(err) = Self::maybe_reject_stale(&mut state, id, version) {
            return Err(err);
        }

        let record = self.list_mut(&mut state, id);
        record.entries.push(entry);
        record.version += 1;
        record.state = "modify-in-progress";
        record.settle_remaining = settle_polls;
        Ok(())
    }

    async fn remove_entry(&self, id: &str, version: u64, cidr: &str) -> ProviderResult<()> {
        let mut state = self.state();
        let settle_polls = self.options.allow_list_settle_polls;
        {
            let record = self.list_mut(&mut state, id);
            if record.version != version {
                return Err(ProviderError::StaleVersion {
                    submitted: version,
                    current: record.version,
                });
            }
            if !record.entries.iter().any(|e| e.cidr == cidr) {
                return Err(ProviderError::NotFound(format!(
                    "entry '{cidr}' in allow-list '{id}'"
                )));
            }
        }
        if let Some(err) = Self::maybe_reject_stale(&mut state, id, version) {
            return Err(err);
        }

        let record = self.list_mut(&mut state, id);
        record.entries.retain(|e| e.cidr != cidr);
        record.version += 1;
        record.state = "modify-in-progress";
        record.settle_remaining = settle_polls;
        Ok(())
    }

    async fn list_state(&self, id: &str) -> ProviderResult<String> {
        let mut state = self.state();
        let record = self.list_mut(&mut state, id);
        if record.settle_remaining > 0 {
            record.settle_remaining -= 1;
        } else if record.state == "modify-in-progress" {
            record.state = "modify-complete";
        }
        Ok(record.state.to_string())
    }
}

#[async_trait]
impl TaskRunner for MemoryCloud {
    async fn run_task(&self, launch: TaskLaunch) -> ProviderResult<String> {
        let mut state = self.state();
        let id = Self::next_id(&mut state);
        let arn = format!("arn:cloud:task/{id}");

        state.tasks.insert(
            arn.clone(),
            TaskRecord {
                cluster: launch.cluster.clone(),
                polls_remaining: self.options.task_run_polls,
            },
        );
        state.task_launches.push(launch);
        Ok(arn)
    }

    async fn task_status(&self, cluster: &str, task_arn: &str) -> ProviderResult<String> {
        let mut state = self.state();
        let record = state
            .tasks
            .get_mut(task_arn)
            .filter(|record| record.cluster == cluster)
            .ok_or_else(|| ProviderError::NotFound(format!("task '{task_arn}'")))?;

        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return Ok("RUNNING".to_string());
        }
        Ok("STOPPED".to_string())
    }
}

#[async_trait]
impl DatabaseAdmin for MemoryCloud {
    async fn create_schema(
        &self,
        host: &str,
        port: &str,
        username: &str,
        _password: &str,
        name: &str,
    ) -> ProviderResult<()> {
        if self.options.fail_schema_creation {
            return Err(ProviderError::Remote(format!(
                "could not create schema '{name}'"
            )));
        }
        self.state().schemas.push(CreatedSchema {
            host: host.to_string(),
            port: port.to_string(),
            username: username.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl AddressResolver for MemoryCloud {
    async fn current_address(&self) -> ProviderResult<IpAddr> {
        Ok(self.options.operator_address)
    }
}

/// Wires one [`MemoryCloud`] into every provider seat.
pub fn providers(cloud: &Arc<MemoryCloud>) -> Providers {
    Providers {
        engine: Arc::clone(cloud) as _,
        certificates: Arc::clone(cloud) as _,
        dns: Arc::clone(cloud) as _,
        secrets: Arc::clone(cloud) as _,
        allow_lists: Arc::clone(cloud) as _,
        tasks: Arc::clone(cloud) as _,
        database: Arc::clone(cloud) as _,
        address: Arc::clone(cloud) as _,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> StackRequest {
        StackRequest {
            name: name.to_string(),
            parameters: vec![Parameter::value(params::KEY_DOMAIN_NAME, "app.example")],
            tags: Vec::new(),
            template_body: "Resources: {}".to_string(),
        }
    }

    #[tokio::test]
    async fn stack_settles_after_the_configured_polls() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            stack_transition_polls: 2,
            output_publish_polls: 0,
            ..MemoryCloudOptions::default()
        });
        cloud.create_stack(request("s")).await.unwrap();

        for _ in 0..2 {
            let description = cloud.describe_stack("s").await.unwrap();
            assert_eq!(description.status, CREATE_IN_PROGRESS);
        }
        let description = cloud.describe_stack("s").await.unwrap();
        assert_eq!(description.status, CREATE_COMPLETE);
        assert_eq!(description.outputs[outputs::DOMAIN_NAME], "app.example");
    }

    #[tokio::test]
    async fn deleted_stack_disappears() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            stack_transition_polls: 0,
            output_publish_polls: 0,
            ..MemoryCloudOptions::default()
        });
        cloud.create_stack(request("s")).await.unwrap();
        cloud.describe_stack("s").await.unwrap();

        cloud.delete_stack("s").await.unwrap();
        let err = cloud.describe_stack("s").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(!cloud.stack_exists("s"));
    }

    #[tokio::test]
    async fn update_resolves_use_previous_against_stored_values() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            stack_transition_polls: 0,
            output_publish_polls: 0,
            ..MemoryCloudOptions::default()
        });
        cloud.create_stack(request("s")).await.unwrap();
        cloud.describe_stack("s").await.unwrap();

        cloud
            .update_stack(StackRequest {
                name: "s".to_string(),
                parameters: vec![Parameter::use_previous(params::KEY_DOMAIN_NAME)],
                tags: Vec::new(),
                template_body: "Resources: {}".to_string(),
            })
            .await
            .unwrap();

        let stored = cloud.stack_parameters("s").unwrap();
        assert_eq!(
            stored,
            vec![Parameter::value(params::KEY_DOMAIN_NAME, "app.example")]
        );
    }

    #[tokio::test]
    async fn update_bumps_the_task_definition_revision() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            stack_transition_polls: 0,
            output_publish_polls: 0,
            ..MemoryCloudOptions::default()
        });
        cloud.create_stack(request("s")).await.unwrap();
        let before = cloud.describe_stack("s").await.unwrap().outputs
            [outputs::MIGRATE_TASK_DEFINITION_ARN]
            .clone();

        cloud.update_stack(request_update()).await.unwrap();
        let after = cloud.describe_stack("s").await.unwrap().outputs
            [outputs::MIGRATE_TASK_DEFINITION_ARN]
            .clone();
        assert_ne!(before, after);
    }

    fn request_update() -> StackRequest {
        StackRequest {
            name: "s".to_string(),
            parameters: vec![Parameter::value(params::KEY_DOMAIN_NAME, "app.example")],
            tags: Vec::new(),
            template_body: "Resources: {}".to_string(),
        }
    }

    #[tokio::test]
    async fn stale_mutation_is_rejected_and_fresh_one_accepted() {
        let cloud = MemoryCloud::default();
        let (_, version) = cloud.describe_list("pl-1").await.unwrap();

        cloud
            .add_entry(
                "pl-1",
                version,
                AllowListEntry {
                    cidr: "10.0.0.1/32".to_string(),
                    description: "first".to_string(),
                },
            )
            .await
            .unwrap();

        // The old version is now stale.
        let err = cloud
            .add_entry(
                "pl-1",
                version,
                AllowListEntry {
                    cidr: "10.0.0.2/32".to_string(),
                    description: "second".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::StaleVersion { .. }));

        let (entries, fresh) = cloud.describe_list("pl-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        cloud
            .add_entry(
                "pl-1",
                fresh,
                AllowListEntry {
                    cidr: "10.0.0.2/32".to_string(),
                    description: "second".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(cloud.allow_list_entries("pl-1").len(), 2);
    }

    #[tokio::test]
    async fn secrets_materialize_after_the_configured_listings() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            secret_list_polls: 2,
            ..MemoryCloudOptions::default()
        });
        cloud.put_parameter("APP_KEY", "k").await.unwrap();

        assert!(cloud.list_parameter_arns().await.unwrap().is_empty());
        assert!(cloud.list_parameter_arns().await.unwrap().is_empty());
        let arns = cloud.list_parameter_arns().await.unwrap();
        assert_eq!(arns["APP_KEY"], "arn:cloud:param/APP_KEY");
    }

    #[tokio::test]
    async fn secret_names_are_scoped_under_the_configured_path() {
        let cloud = MemoryCloud::new(
            MemoryCloudOptions {
                secret_list_polls: 0,
                ..MemoryCloudOptions::default()
            }
            .with_secret_path("/shop-x7k2/stage/"),
        );
        cloud.put_parameter("APP_ENV", "stage").await.unwrap();

        // The trait surface works in bare names while storage and arns
        // carry the full path.
        assert_eq!(cloud.list_parameters().await.unwrap(), vec!["APP_ENV".to_string()]);
        let arns = cloud.list_parameter_arns().await.unwrap();
        assert_eq!(arns["APP_ENV"], "arn:cloud:param/shop-x7k2/stage/APP_ENV");
        assert_eq!(cloud.secret_value("APP_ENV").unwrap(), "stage");
        assert_eq!(cloud.secret_names(), vec!["/shop-x7k2/stage/APP_ENV".to_string()]);

        cloud.delete_parameter("APP_ENV").await.unwrap();
        assert!(cloud.secret_names().is_empty());
    }

    #[tokio::test]
    async fn certificate_issues_only_after_validation_record_lands() {
        let cloud = MemoryCloud::new(MemoryCloudOptions {
            certificate_polls: 0,
            ..MemoryCloudOptions::default()
        });
        let request = cloud.request_certificate("app.example").await.unwrap();
        assert_eq!(
            cloud.certificate_status(&request.arn).await.unwrap(),
            "PENDING_VALIDATION"
        );

        cloud
            .upsert_records("Z1", std::slice::from_ref(&request.validation_record))
            .await
            .unwrap();
        assert_eq!(cloud.certificate_status(&request.arn).await.unwrap(), "ISSUED");
    }
}
