//! Post-provision coordination.
//!
//! A freshly created stack is not yet a working environment: the
//! application schema does not exist, no secrets are stored, the task
//! definitions reference no secrets, and the database accepts no traffic.
//! The coordinator runs the fixed step sequence that closes that gap.
//!
//! Step order matters. The schema must exist before migrations run,
//! secrets must materialize before the stack update references them, and
//! the update must refresh the migrate task definition before the
//! migration task launches against it.

use crate::credentials;
use crate::error::{OrchestratorError, Result};
use crate::params::UpdateParams;
use crate::provider::{AllowListEntry, ProviderError, Providers, TaskLaunch};
use crate::secrets::SecretsSync;
use crate::stack::{self, StackService};
use crate::wait::{self, Probe, WaitSettings};
use reef_core::{Environment, outputs};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LIST_READY: &str = "modify-complete";
const TASK_STOPPED: &str = "STOPPED";

const VERSION_RETRIES: u32 = 3;
const REFRESH_TRIES: u32 = 10;
const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

const OPERATOR_GRANT: &str = "Temporary operator access";
const MIGRATE_COMMAND: &[&str] = &["bin/release", "migrate", "--force"];

/// Inputs the coordinator cannot derive from the stack itself.
#[derive(Debug, Clone)]
pub struct ProvisionInputs {
    pub region: String,
    pub db_username: String,
    pub db_password: String,
    /// Secret names the environment requires; every one must have a known
    /// value source.
    pub required_variables: Vec<String>,
}

/// What the coordinator produced, for operator-facing reporting.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub domain: String,
    pub database_name: String,
    pub secret_names: Vec<String>,
    pub migration_task_arn: String,
}

pub struct PostProvisionCoordinator {
    providers: Providers,
    stack: Arc<StackService>,
    template_path: PathBuf,
}

impl PostProvisionCoordinator {
    pub fn new(providers: Providers, stack: Arc<StackService>, template_path: PathBuf) -> Self {
        Self {
            providers,
            stack,
            template_path,
        }
    }

    /// Runs the full post-create sequence and returns a report.
    ///
    /// Once the temporary database grant from step 1 is written, step 3
    /// revokes it even when the grant never settles or schema creation
    /// fails; that original error still wins over any revocation error.
    pub async fn run(&self, inputs: &ProvisionInputs) -> Result<ProvisionReport> {
        let outputs = self.stack.outputs_with_retry(outputs::POST_CREATE_KEYS).await?;

        let address = self.providers.address.current_address().await?;
        let operator_cidr = format!("{address}/32");
        let admin_list = output(&outputs, outputs::DB_ADMIN_ACCESS_PREFIX_LIST_ID)?;

        info!(cidr = %operator_cidr, "granting temporary database access");
        self.add_with_retry(admin_list, &operator_cidr).await?;

        // The temporary entry exists from here on: the revoke runs no
        // matter how propagation or schema creation goes, and the first
        // failure wins.
        let database_name =
            reef_core::database_name(self.stack.project_name(), self.stack.environment());
        let schema_result = async {
            self.settle(admin_list).await?;
            info!(schema = %database_name, "creating application schema");
            self.providers
                .database
                .create_schema(
                    output(&outputs, outputs::DB_HOST)?,
                    output(&outputs, outputs::DB_PORT)?,
                    &inputs.db_username,
                    &inputs.db_password,
                    &database_name,
                )
                .await?;
            Ok::<_, OrchestratorError>(())
        }
        .await;

        info!("revoking temporary database access");
        let revoke_result = self.revoke(admin_list, &operator_cidr).await;

        schema_result?;
        if let Err(err) = revoke_result {
            warn!(%err, "temporary database grant was not revoked");
            return Err(err);
        }

        info!("storing application secrets");
        let values = self.secret_values(inputs, &database_name, &outputs)?;
        let secret_names: Vec<String> = values.keys().cloned().collect();
        let arns = SecretsSync::new(Arc::clone(&self.providers.secrets))
            .create_and_wait(&values)
            .await?;

        info!("updating stack with secret references");
        let stale_task_definition = output(&outputs, outputs::MIGRATE_TASK_DEFINITION_ARN)?;
        self.stack
            .update(true, &arns, &UpdateParams::default(), &self.template_path)
            .await?;
        self.stack
            .wait_for(stack::UPDATE_COMPLETE)
            .await?
            .expect_success(stack::UPDATE_COMPLETE)?;

        let refreshed = self.refreshed_outputs(stale_task_definition).await?;

        info!("running database migrations");
        let migration_task_arn = self.run_migrations(&outputs, &refreshed).await?;

        info!(cidr = %operator_cidr, "granting application access");
        self.allow(output(&outputs, outputs::APP_ACCESS_PREFIX_LIST_ID)?, &operator_cidr)
            .await?;

        Ok(ProvisionReport {
            domain: output(&outputs, outputs::DOMAIN_NAME)?.to_string(),
            database_name,
            secret_names,
            migration_task_arn,
        })
    }

    /// Adds `cidr` to the allow-list and waits for the change to settle.
    async fn allow(&self, list_id: &str, cidr: &str) -> Result<()> {
        self.add_with_retry(list_id, cidr).await?;
        self.settle(list_id).await
    }

    /// Adds `cidr` to the allow-list without waiting for propagation.
    ///
    /// The list version is re-read immediately before the mutation; a
    /// stale-version rejection means another writer got in between, so the
    /// describe-and-mutate pair is retried.
    async fn add_with_retry(&self, list_id: &str, cidr: &str) -> Result<()> {
        let lists = &self.providers.allow_lists;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (_, version) = lists.describe_list(list_id).await?;
            match lists
                .add_entry(
                    list_id,
                    version,
                    AllowListEntry {
                        cidr: cidr.to_string(),
                        description: OPERATOR_GRANT.to_string(),
                    },
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(ProviderError::StaleVersion { .. }) if attempt < VERSION_RETRIES => {
                    debug!(list_id, attempt, "allow-list version superseded, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Removes `cidr` from the allow-list and waits for the change to
    /// settle, with the same version-retry discipline as
    /// [`PostProvisionCoordinator::add_with_retry`].
    async fn revoke(&self, list_id: &str, cidr: &str) -> Result<()> {
        let lists = &self.providers.allow_lists;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (_, version) = lists.describe_list(list_id).await?;
            match lists.remove_entry(list_id, version, cidr).await {
                Ok(()) => break,
                Err(ProviderError::StaleVersion { .. }) if attempt < VERSION_RETRIES => {
                    debug!(list_id, attempt, "allow-list version superseded, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.settle(list_id).await
    }

    async fn settle(&self, list_id: &str) -> Result<()> {
        let lists = Arc::clone(&self.providers.allow_lists);
        let id = list_id.to_string();
        wait::wait_until(
            move || {
                let lists = Arc::clone(&lists);
                let id = id.clone();
                async move { Ok(Probe::Status(lists.list_state(&id).await?)) }
            },
            WaitSettings::short(),
            LIST_READY,
        )
        .await?
        .expect_success(LIST_READY)?;
        Ok(())
    }

    /// Re-reads the volatile outputs after the secrets update until the
    /// migrate task definition no longer matches the pre-update value.
    /// Launching the migration against the stale definition would run it
    /// without any secrets.
    async fn refreshed_outputs(&self, stale: &str) -> Result<BTreeMap<String, String>> {
        for tries in 1..=REFRESH_TRIES {
            let refreshed = self.stack.outputs(outputs::POST_UPDATE_KEYS).await?;
            match refreshed.get(outputs::MIGRATE_TASK_DEFINITION_ARN) {
                Some(arn) if arn != stale
                    && refreshed.contains_key(outputs::CONTAINER_CLUSTER_ARN) =>
                {
                    return Ok(refreshed);
                }
                _ => {}
            }
            debug!(tries, "stack outputs still reflect the pre-update task definition");
            if tries < REFRESH_TRIES {
                tokio::time::sleep(REFRESH_INTERVAL).await;
            }
        }

        Err(OrchestratorError::Consistency(format!(
            "stack '{}' outputs did not refresh after the secrets update",
            self.stack.name()
        )))
    }

    async fn run_migrations(
        &self,
        outputs: &BTreeMap<String, String>,
        refreshed: &BTreeMap<String, String>,
    ) -> Result<String> {
        let cluster = output(refreshed, outputs::CONTAINER_CLUSTER_ARN)?.to_string();
        let launch = TaskLaunch {
            cluster: cluster.clone(),
            security_groups: vec![
                output(outputs, outputs::DB_SECURITY_GROUP_ID)?.to_string(),
                output(outputs, outputs::CONTAINERS_SECURITY_GROUP_ID)?.to_string(),
                output(outputs, outputs::CACHE_SECURITY_GROUP_ID)?.to_string(),
            ],
            subnets: vec![output(outputs, outputs::SUBNET_1_ID)?.to_string()],
            command: MIGRATE_COMMAND.iter().map(|s| s.to_string()).collect(),
            task_definition: output(refreshed, outputs::MIGRATE_TASK_DEFINITION_ARN)?.to_string(),
        };

        let task_arn = self.providers.tasks.run_task(launch).await?;
        info!(task = %task_arn, "migration task started");

        let tasks = Arc::clone(&self.providers.tasks);
        let probe_cluster = cluster.clone();
        let probe_arn = task_arn.clone();
        wait::wait_until(
            move || {
                let tasks = Arc::clone(&tasks);
                let cluster = probe_cluster.clone();
                let arn = probe_arn.clone();
                async move {
                    match tasks.task_status(&cluster, &arn).await? {
                        status if status == TASK_STOPPED => Ok(Probe::Status(status)),
                        _ => Ok(Probe::InProgress),
                    }
                }
            },
            WaitSettings::long(),
            TASK_STOPPED,
        )
        .await?
        .expect_success(TASK_STOPPED)?;

        Ok(task_arn)
    }

    /// Resolves a value for every required secret name.
    fn secret_values(
        &self,
        inputs: &ProvisionInputs,
        database_name: &str,
        outputs: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let environment = self.stack.environment();
        let mut values = BTreeMap::new();

        for name in &inputs.required_variables {
            let value = match name.as_str() {
                "APP_ENV" => environment.to_string(),
                "APP_KEY" => credentials::application_key(),
                "CACHE_DRIVER" => "redis".to_string(),
                "DB_CONNECTION" => "mysql".to_string(),
                "DB_HOST" => output(outputs, outputs::DB_HOST)?.to_string(),
                "DB_PORT" => output(outputs, outputs::DB_PORT)?.to_string(),
                "DB_DATABASE" => database_name.to_string(),
                "LOG_CHANNEL" => "errorlog".to_string(),
                "QUEUE_CONNECTION" => "sqs".to_string(),
                "MAIL_DRIVER" => match environment {
                    Environment::Production => "ses".to_string(),
                    Environment::Stage => "smtp".to_string(),
                },
                "AWS_DEFAULT_REGION" => inputs.region.clone(),
                "REDIS_HOST" => output(outputs, outputs::CACHE_ENDPOINT_ADDRESS)?.to_string(),
                "REDIS_PORT" => output(outputs, outputs::CACHE_ENDPOINT_PORT)?.to_string(),
                "SQS_QUEUE" => output(outputs, outputs::QUEUE_URL)?.to_string(),
                "AWS_BUCKET" => output(outputs, outputs::BUCKET_NAME)?.to_string(),
                other => {
                    return Err(OrchestratorError::Validation(format!(
                        "no value source for required variable '{other}'"
                    )));
                }
            };
            values.insert(name.clone(), value);
        }

        Ok(values)
    }
}

fn output<'a>(outputs: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    outputs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| OrchestratorError::Consistency(format!("stack output '{key}' is missing")))
}
