//! Error taxonomy for lifecycle workflows.

use crate::provider::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by orchestration workflows.
///
/// `Validation`, `Conflict` and `NotFound` are detected before any
/// mutating call and abort with no side effects. `Timeout`,
/// `OperationFailed` and `Consistency` are raised only after a mutating
/// call was issued; the remote side effect may still be in progress and no
/// compensating action is attempted.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Missing or invalid local configuration.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A create was attempted against an existing stack.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An expected remote resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A wait loop exhausted its try budget without observing a terminal
    /// status.
    #[error("timed out after {tries} tries ({} seconds waited)", waited.as_secs())]
    Timeout { tries: u32, waited: Duration },

    /// A remote operation completed, but with a terminal status other than
    /// the expected one. Distinct from a timeout: the operation is done.
    #[error("operation finished with status '{status}' (expected '{expected}')")]
    OperationFailed { expected: String, status: String },

    /// Post-update outputs did not refresh within bounded retries.
    #[error("consistency check failed: {0}")]
    Consistency(String),

    /// A collaborator failed. Never swallowed except where "resource
    /// absent" is reinterpreted as a terminal status (status probe and
    /// delete wait).
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
