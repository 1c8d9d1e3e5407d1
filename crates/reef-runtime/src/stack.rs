//! Stack lifecycle operations.
//!
//! A stack moves through `ABSENT -> CREATE_IN_PROGRESS -> CREATE_COMPLETE
//! | CREATE_FAILED`, then `UPDATE_IN_PROGRESS -> UPDATE_COMPLETE |
//! UPDATE_FAILED` on updates, and from any non-absent state through
//! `DELETE_IN_PROGRESS` to gone. Failed states require operator
//! intervention; no automatic rollback is attempted here.

use crate::error::{OrchestratorError, Result};
use crate::params::{self, CreateParams, UpdateParams};
use crate::provider::{CloudEngine, ProviderError, StackRequest};
use crate::template;
use crate::wait::{self, Probe, WaitOutcome, WaitSettings};
use reef_core::Environment;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const CREATE_COMPLETE: &str = "CREATE_COMPLETE";
pub const UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";
pub const DELETED: &str = wait::STATUS_DELETED;

const OUTPUT_TRIES: u32 = 10;
const OUTPUT_INTERVAL: Duration = Duration::from_secs(2);

/// Remote stack status as a tagged enumeration. Parsed fresh from every
/// describe; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    UpdateInProgress,
    UpdateComplete,
    UpdateFailed,
    RollbackInProgress,
    RollbackComplete,
    DeleteInProgress,
    DeleteFailed,
    /// A status string this client does not model. Kept verbatim so it
    /// can be reported to the operator.
    Other(String),
}

impl StackStatus {
    pub fn is_in_progress(&self) -> bool {
        match self {
            StackStatus::CreateInProgress
            | StackStatus::UpdateInProgress
            | StackStatus::RollbackInProgress
            | StackStatus::DeleteInProgress => true,
            StackStatus::Other(raw) => raw.ends_with("_IN_PROGRESS"),
            _ => false,
        }
    }

    pub fn is_failed(&self) -> bool {
        match self {
            StackStatus::CreateFailed
            | StackStatus::UpdateFailed
            | StackStatus::DeleteFailed => true,
            StackStatus::Other(raw) => raw.ends_with("_FAILED"),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => CREATE_COMPLETE,
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateComplete => UPDATE_COMPLETE,
            StackStatus::UpdateFailed => "UPDATE_FAILED",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::Other(raw) => raw,
        }
    }
}

impl FromStr for StackStatus {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match raw {
            "CREATE_IN_PROGRESS" => StackStatus::CreateInProgress,
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "CREATE_FAILED" => StackStatus::CreateFailed,
            "UPDATE_IN_PROGRESS" => StackStatus::UpdateInProgress,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "UPDATE_FAILED" => StackStatus::UpdateFailed,
            "ROLLBACK_IN_PROGRESS" => StackStatus::RollbackInProgress,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
            "DELETE_FAILED" => StackStatus::DeleteFailed,
            other => StackStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle operations for one environment's stack.
pub struct StackService {
    engine: Arc<dyn CloudEngine>,
    name: String,
    project_name: String,
    environment: Environment,
}

impl StackService {
    pub fn new(
        engine: Arc<dyn CloudEngine>,
        project_name: &str,
        project_id: &str,
        environment: Environment,
    ) -> Self {
        Self {
            engine,
            name: reef_core::stack_name(project_name, project_id, environment),
            project_name: project_name.to_string(),
            environment,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Single status probe. `None` means no stack exists for this
    /// environment; remote failures are swallowed here and only here.
    pub async fn status(&self) -> Option<StackStatus> {
        match self.engine.describe_stack(&self.name).await {
            Ok(description) if !description.status.is_empty() => description.status.parse().ok(),
            Ok(_) => None,
            Err(err) => {
                debug!(stack = %self.name, %err, "status probe failed, treating as absent");
                None
            }
        }
    }

    /// Submits a stack creation and returns immediately; callers wait via
    /// [`StackService::wait_for`].
    ///
    /// The conflict check runs before any mutating call: creating over an
    /// existing stack is rejected with no side effects.
    pub async fn create(&self, params: &CreateParams, template_path: &Path) -> Result<()> {
        let parameters = params.reconcile()?;
        let template_body = template::render(template_path, &BTreeMap::new())?;

        if let Some(status) = self.status().await {
            return Err(OrchestratorError::Conflict(format!(
                "stack '{}' already exists with status '{status}'",
                self.name
            )));
        }

        info!(stack = %self.name, "submitting stack creation");

        self.engine
            .create_stack(StackRequest {
                name: self.name.clone(),
                parameters,
                tags: self.resource_tags(),
                template_body,
            })
            .await?;

        Ok(())
    }

    /// Submits a stack update with a fully reconciled parameter set and a
    /// template re-rendered against the current secrets block; returns
    /// immediately.
    pub async fn update(
        &self,
        enabled: bool,
        secrets: &BTreeMap<String, String>,
        changes: &UpdateParams,
        template_path: &Path,
    ) -> Result<()> {
        let template_body = template::render(template_path, secrets)?;

        if self.status().await.is_none() {
            return Err(OrchestratorError::NotFound(format!(
                "no stack exists for the '{}' environment",
                self.environment
            )));
        }

        info!(stack = %self.name, "submitting stack update");

        self.engine
            .update_stack(StackRequest {
                name: self.name.clone(),
                parameters: params::reconcile_update(enabled, changes),
                tags: self.resource_tags(),
                template_body,
            })
            .await?;

        Ok(())
    }

    /// Submits a stack deletion; returns immediately.
    pub async fn delete(&self) -> Result<()> {
        if self.status().await.is_none() {
            return Err(OrchestratorError::NotFound(format!(
                "no stack exists for the '{}' environment",
                self.environment
            )));
        }

        info!(stack = %self.name, "submitting stack deletion");
        self.engine.delete_stack(&self.name).await?;
        Ok(())
    }

    /// Currently published outputs, restricted to the requested keys.
    /// Outputs populate asynchronously after a terminal success status, so
    /// an empty or partial map means "not yet available", not an error.
    pub async fn outputs(&self, keys: &[&str]) -> Result<BTreeMap<String, String>> {
        let description = self.engine.describe_stack(&self.name).await?;
        Ok(description
            .outputs
            .into_iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .collect())
    }

    /// Polls [`StackService::outputs`] until every requested key is
    /// published, bounded at 10 tries of 2 seconds.
    pub async fn outputs_with_retry(&self, keys: &[&str]) -> Result<BTreeMap<String, String>> {
        for tries in 1..=OUTPUT_TRIES {
            let outputs = self.outputs(keys).await?;
            if keys.iter().all(|key| outputs.contains_key(*key)) {
                return Ok(outputs);
            }
            debug!(stack = %self.name, tries, "stack outputs not fully published yet");
            if tries < OUTPUT_TRIES {
                tokio::time::sleep(OUTPUT_INTERVAL).await;
            }
        }

        Err(OrchestratorError::Consistency(format!(
            "stack '{}' outputs were not published after {OUTPUT_TRIES} tries",
            self.name
        )))
    }

    /// Long-waits for the stack to reach a terminal status. A describe
    /// that fails with "not found" reports the `DELETED` terminal status,
    /// so deletions can be confirmed after the stack disappears entirely.
    pub async fn wait_for(&self, expected: &str) -> Result<WaitOutcome> {
        let engine = Arc::clone(&self.engine);
        let name = self.name.clone();

        wait::wait_until(
            move || {
                let engine = Arc::clone(&engine);
                let name = name.clone();
                async move {
                    match engine.describe_stack(&name).await {
                        Ok(description) if description.status.is_empty() => Ok(Probe::InProgress),
                        Ok(description) => Ok(Probe::Status(description.status)),
                        Err(ProviderError::NotFound(_)) => Ok(Probe::Gone),
                        Err(err) => Err(err),
                    }
                }
            },
            WaitSettings::long(),
            expected,
        )
        .await
    }

    fn resource_tags(&self) -> Vec<(String, String)> {
        vec![
            ("Project".to_string(), self.project_name.clone()),
            ("Environment".to_string(), self.environment.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_and_unknown_values() {
        assert_eq!(
            "CREATE_COMPLETE".parse::<StackStatus>().unwrap(),
            StackStatus::CreateComplete
        );
        let odd: StackStatus = "REVIEW_IN_PROGRESS".parse().unwrap();
        assert_eq!(odd, StackStatus::Other("REVIEW_IN_PROGRESS".to_string()));
        assert!(odd.is_in_progress());
        assert!(!odd.is_terminal());
    }

    #[test]
    fn terminal_and_failed_classification() {
        assert!("CREATE_COMPLETE".parse::<StackStatus>().unwrap().is_terminal());
        assert!("UPDATE_FAILED".parse::<StackStatus>().unwrap().is_failed());
        assert!(!"DELETE_IN_PROGRESS".parse::<StackStatus>().unwrap().is_terminal());
        assert!("ROLLBACK_COMPLETE".parse::<StackStatus>().unwrap().is_terminal());
    }

    #[test]
    fn status_round_trips_display() {
        for raw in ["CREATE_IN_PROGRESS", "UPDATE_COMPLETE", "SOMETHING_ELSE"] {
            let status: StackStatus = raw.parse().unwrap();
            assert_eq!(status.to_string(), raw);
        }
    }
}
