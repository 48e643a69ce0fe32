//! Application service: wait for a TCP port to accept connections.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use tokio_util::sync::CancellationToken;

use crate::application::ports::{PortProber, ProbeOutcome};
use crate::application::services::retry::pause;
use crate::domain::{DeployError, RetryPolicy};

/// Probe `host:port` until it is open or `policy.max_attempts` probes have
/// failed.
///
/// Transient failures wait `policy.delay(attempt)` before the next probe.
/// There is no wait after the final probe.
///
/// # Errors
///
/// - [`DeployError::ReadinessTimeout`] once the budget is spent.
/// - [`DeployError::Probe`] as soon as the prober reports a permanent error.
/// - [`DeployError::Cancelled`] if `cancel` fires before or between probes.
pub async fn wait_for_port(
    prober: &dyn PortProber,
    host: &str,
    port: u16,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(), DeployError> {
    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DeployError::Cancelled),
            outcome = prober.probe(host, port) => outcome?,
        };
        match outcome {
            ProbeOutcome::Open => {
                tracing::debug!(host, port, attempt, "port open");
                return Ok(());
            }
            ProbeOutcome::NotReady => {
                tracing::debug!(host, port, attempt, "port not ready");
                if attempt < policy.max_attempts {
                    pause(policy, attempt, cancel).await?;
                }
            }
        }
    }
    Err(DeployError::ReadinessTimeout {
        host: host.to_string(),
        port,
        attempts: policy.max_attempts,
    })
}
