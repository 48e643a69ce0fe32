//! Cancellable wait between polling attempts.

use tokio_util::sync::CancellationToken;

use crate::domain::{DeployError, RetryPolicy};

/// Sleep for `policy.delay(attempt)` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`DeployError::Cancelled`] if the token is or becomes cancelled.
pub async fn pause(
    policy: &RetryPolicy,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<(), DeployError> {
    if cancel.is_cancelled() {
        return Err(DeployError::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DeployError::Cancelled),
        () = tokio::time::sleep(policy.delay(attempt)) => Ok(()),
    }
}
