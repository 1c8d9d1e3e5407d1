//! Generic bounded-retry polling engine.
//!
//! Every long-running remote operation (stack apply, certificate
//! validation, allow-list propagation, task completion) is observed
//! through the same loop: probe once, sleep the configured interval if the
//! operation is still in progress, repeat until a terminal status appears
//! or the try budget runs out.

use crate::error::{OrchestratorError, Result};
use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Terminal status reported when the polled resource has disappeared
/// entirely rather than transitioning through a final status value.
pub const STATUS_DELETED: &str = "DELETED";

/// One status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The operation has not reached a terminal status yet.
    InProgress,

    /// A raw status string. Terminal unless it carries the in-progress
    /// suffix from [`WaitSettings`].
    Status(String),

    /// The resource no longer exists; reported as [`STATUS_DELETED`].
    Gone,
}

/// Polling budget and cadence.
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    pub max_tries: u32,
    pub interval: Duration,
    /// Suffix marking a status as still in progress.
    pub in_progress_suffix: &'static str,
}

impl WaitSettings {
    /// Stack apply and delete: up to an hour, checked every minute.
    pub fn long() -> Self {
        Self {
            max_tries: 60,
            interval: Duration::from_secs(60),
            in_progress_suffix: "_IN_PROGRESS",
        }
    }

    /// Allow-list propagation: roughly thirty seconds.
    pub fn short() -> Self {
        Self {
            max_tries: 10,
            interval: Duration::from_secs(3),
            in_progress_suffix: "in-progress",
        }
    }
}

/// Outcome of a completed wait. `success` is defined only relative to the
/// expected terminal status the caller supplied; a terminal status that
/// differs is a completed-but-failed operation, not a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    pub status: String,
    pub success: bool,
    pub tries: u32,
}

impl WaitOutcome {
    /// Converts a completed-but-failed outcome into an error.
    pub fn expect_success(self, expected: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(OrchestratorError::OperationFailed {
                expected: expected.to_string(),
                status: self.status,
            })
        }
    }
}

/// Polls `probe` until it reports a terminal status, or fails with
/// [`OrchestratorError::Timeout`] once the budget is exhausted.
///
/// Probe errors propagate unchanged; callers that need the "absent means
/// deleted" reinterpretation map [`ProviderError::NotFound`] to
/// [`Probe::Gone`] inside the probe itself.
pub async fn wait_until<F, Fut>(
    mut probe: F,
    settings: WaitSettings,
    expected: &str,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Probe, ProviderError>>,
{
    for tries in 1..=settings.max_tries {
        let terminal = match probe().await? {
            Probe::Gone => Some(STATUS_DELETED.to_string()),
            Probe::Status(status) if !status.ends_with(settings.in_progress_suffix) => {
                Some(status)
            }
            Probe::Status(_) | Probe::InProgress => None,
        };

        if let Some(status) = terminal {
            return Ok(WaitOutcome {
                success: status == expected,
                status,
                tries,
            });
        }

        debug!(
            tries,
            max_tries = settings.max_tries,
            interval_secs = settings.interval.as_secs(),
            "operation still in progress"
        );
        tokio::time::sleep(settings.interval).await;
    }

    Err(OrchestratorError::Timeout {
        tries: settings.max_tries,
        waited: settings.interval * settings.max_tries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(max_tries: u32) -> WaitSettings {
        WaitSettings {
            max_tries,
            interval: Duration::from_secs(60),
            in_progress_suffix: "_IN_PROGRESS",
        }
    }

    fn scripted(
        script: &'static [&'static str],
    ) -> impl FnMut() -> std::future::Ready<std::result::Result<Probe, ProviderError>> {
        let calls = AtomicU32::new(0);
        move || {
            let i = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let status = script[i.min(script.len() - 1)];
            std::future::ready(Ok(Probe::Status(status.to_string())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_exactly_three_polls() {
        let probe = scripted(&["X_IN_PROGRESS", "X_IN_PROGRESS", "X_COMPLETE"]);
        let outcome = wait_until(probe, settings(10), "X_COMPLETE").await.unwrap();
        assert_eq!(
            outcome,
            WaitOutcome {
                status: "X_COMPLETE".to_string(),
                success: true,
                tries: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_terminal_status_is_not_success() {
        let probe = scripted(&["X_IN_PROGRESS", "X_FAILED"]);
        let outcome = wait_until(probe, settings(10), "X_COMPLETE").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, "X_FAILED");

        let err = outcome.expect_success("X_COMPLETE").unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::OperationFailed { ref status, .. } if status == "X_FAILED"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_times_out_with_tries_equal_to_budget() {
        let probe = scripted(&["X_IN_PROGRESS"]);
        let err = wait_until(probe, settings(5), "X_COMPLETE").await.unwrap_err();
        match err {
            OrchestratorError::Timeout { tries, waited } => {
                assert_eq!(tries, 5);
                assert_eq!(waited, Duration::from_secs(300));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gone_resource_is_terminal_deleted_after_one_poll() {
        let outcome = wait_until(
            || std::future::ready(Ok(Probe::Gone)),
            settings(10),
            STATUS_DELETED,
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            WaitOutcome {
                status: STATUS_DELETED.to_string(),
                success: true,
                tries: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_propagate() {
        let err = wait_until(
            || std::future::ready(Err(ProviderError::Remote("boom".to_string()))),
            settings(10),
            "X_COMPLETE",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::Provider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn short_suffix_spelling_is_respected() {
        let calls = AtomicU32::new(0);
        let probe = move || {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            let status = if i == 0 { "modify-in-progress" } else { "modify-complete" };
            std::future::ready(Ok(Probe::Status(status.to_string())))
        };
        let outcome = wait_until(probe, WaitSettings::short(), "modify-complete")
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tries, 2);
    }
}
