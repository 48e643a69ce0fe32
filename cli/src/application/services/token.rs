//! Application service: mint a Chain Core client token over SSH.

use std::time::Duration;

use crate::application::ports::RemoteShell;
use crate::domain::token::{parse_token_output, token_command};
use crate::domain::{DeployError, InstanceHandle};

/// Run the token command on the droplet as `root` with the job's key.
///
/// # Errors
///
/// - [`DeployError::Credential`] if the handle's credentials were released.
/// - [`DeployError::RemoteExecution`] on transport failure or when the output
///   lacks the `do:` prefix; the reason is the raw trimmed output.
pub async fn create_client_token(
    shell: &dyn RemoteShell,
    instance: &InstanceHandle,
    timeout: Duration,
) -> Result<String, DeployError> {
    let credentials = instance
        .credentials()
        .ok_or_else(|| DeployError::Credential("instance credentials already released".to_string()))?;
    let output = shell
        .run(instance.ipv4(), credentials, &token_command(), timeout)
        .await?;
    let token = parse_token_output(&output)?;
    tracing::info!(droplet_id = instance.id(), "client token created");
    Ok(token)
}
