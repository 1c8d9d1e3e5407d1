//! Collaborator seams for every remote system the orchestrator drives.
//!
//! Each trait covers one opaque remote service. Implementations perform the
//! wire-level calls; the orchestrator only sees structured results or
//! [`ProviderError`]s.

use crate::params::Parameter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by collaborator implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The addressed remote resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// An allow-list mutation was submitted against a superseded version.
    /// Retryable: re-describe the list and try again.
    #[error("allow-list version {submitted} is stale (current version is {current})")]
    StaleVersion { submitted: u64, current: u64 },

    /// The remote service failed in a way the orchestrator does not
    /// recognize as a domain condition.
    #[error("remote operation failed: {0}")]
    Remote(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A fully reconciled stack submission.
#[derive(Debug, Clone)]
pub struct StackRequest {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub tags: Vec<(String, String)>,
    pub template_body: String,
}

/// Current remote view of a stack: the raw status string plus whatever
/// outputs have published so far. Status is always read remotely, never
/// cached across calls.
#[derive(Debug, Clone, Default)]
pub struct StackDescription {
    pub status: String,
    pub outputs: BTreeMap<String, String>,
}

/// The declarative-infrastructure engine (stack-style apply/describe/delete).
#[async_trait]
pub trait CloudEngine: Send + Sync {
    async fn create_stack(&self, request: StackRequest) -> ProviderResult<()>;
    async fn update_stack(&self, request: StackRequest) -> ProviderResult<()>;
    async fn delete_stack(&self, name: &str) -> ProviderResult<()>;
    async fn describe_stack(&self, name: &str) -> ProviderResult<StackDescription>;
}

/// DNS record to upsert for certificate validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    pub record_type: String,
    pub value: String,
}

/// Result of requesting a certificate: the ARN is set as soon as the
/// request succeeds, and the validation record tells the caller what to
/// publish in DNS before validation can complete.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub arn: String,
    pub validation_record: DnsRecord,
}

#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn request_certificate(&self, domain: &str) -> ProviderResult<CertificateRequest>;
    async fn certificate_status(&self, arn: &str) -> ProviderResult<String>;
}

#[async_trait]
pub trait DnsZones: Send + Sync {
    /// Zone id for a root domain, or `None` when no zone matches.
    async fn hosted_zone_id(&self, root_domain: &str) -> ProviderResult<Option<String>>;

    /// Upsert records into a zone; returns a change id to poll.
    async fn upsert_records(&self, zone_id: &str, records: &[DnsRecord]) -> ProviderResult<String>;

    /// Raw change status, e.g. `PENDING` or `INSYNC`.
    async fn change_status(&self, change_id: &str) -> ProviderResult<String>;
}

/// The secret store, scoped to a single environment at construction time:
/// names like `APP_ENV` are relative, and implementations map them to a
/// per-environment path so no operation can reach another environment's
/// parameters. Stored values materialize ARNs asynchronously; a name
/// appears in `list_parameter_arns` only once its value is fully persisted.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put_parameter(&self, name: &str, value: &str) -> ProviderResult<()>;
    async fn delete_parameter(&self, name: &str) -> ProviderResult<()>;
    async fn list_parameters(&self) -> ProviderResult<Vec<String>>;
    async fn list_parameter_arns(&self) -> ProviderResult<BTreeMap<String, String>>;
}

/// One CIDR entry in a managed allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    pub cidr: String,
    pub description: String,
}

/// A versioned, shared network allow-list. Mutations must carry the
/// current version and are rejected with [`ProviderError::StaleVersion`]
/// otherwise, so callers re-describe immediately before every mutation.
#[async_trait]
pub trait NetworkAllowList: Send + Sync {
    async fn describe_list(&self, id: &str) -> ProviderResult<(Vec<AllowListEntry>, u64)>;
    async fn add_entry(&self, id: &str, version: u64, entry: AllowListEntry) -> ProviderResult<()>;
    async fn remove_entry(&self, id: &str, version: u64, cidr: &str) -> ProviderResult<()>;

    /// Raw propagation state, e.g. `modify-in-progress` or `modify-complete`.
    async fn list_state(&self, id: &str) -> ProviderResult<String>;
}

/// One-shot remote execution (e.g. a migration run).
#[derive(Debug, Clone)]
pub struct TaskLaunch {
    pub cluster: String,
    pub security_groups: Vec<String>,
    pub subnets: Vec<String>,
    pub command: Vec<String>,
    pub task_definition: String,
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Starts the task and returns its ARN.
    async fn run_task(&self, launch: TaskLaunch) -> ProviderResult<String>;

    /// Raw task status, e.g. `RUNNING` or `STOPPED`.
    async fn task_status(&self, cluster: &str, task_arn: &str) -> ProviderResult<String>;
}

/// Administrative access to the freshly provisioned database.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn create_schema(
        &self,
        host: &str,
        port: &str,
        username: &str,
        password: &str,
        name: &str,
    ) -> ProviderResult<()>;
}

/// Resolves the operator's current public address for temporary
/// allow-list grants.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn current_address(&self) -> ProviderResult<IpAddr>;
}

/// Bundle of every collaborator the workflows need.
#[derive(Clone)]
pub struct Providers {
    pub engine: Arc<dyn CloudEngine>,
    pub certificates: Arc<dyn CertificateAuthority>,
    pub dns: Arc<dyn DnsZones>,
    pub secrets: Arc<dyn SecretStore>,
    pub allow_lists: Arc<dyn NetworkAllowList>,
    pub tasks: Arc<dyn TaskRunner>,
    pub database: Arc<dyn DatabaseAdmin>,
    pub address: Arc<dyn AddressResolver>,
}
