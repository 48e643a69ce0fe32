//! Application service: create the volume and droplet, then wait for both
//! public addresses.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use tokio_util::sync::CancellationToken;

use crate::application::ports::{CloudProvider, InstanceSpec, ProgressReporter};
use crate::application::services::retry::pause;
use crate::domain::bootstrap::render_user_data;
use crate::domain::{CredentialPair, DeployError, InstanceConfig, InstanceHandle, RetryPolicy};

/// Provision one droplet with an attached block storage volume.
///
/// Steps run strictly in order and the first error aborts. Nothing created
/// before the failure is rolled back. The configuration is validated before
/// the first API call.
///
/// Address polling waits `policy.delay(attempt)` before every poll.
///
/// # Errors
///
/// - [`DeployError::Configuration`] for an invalid `config`.
/// - [`DeployError::ProviderApi`] from any provider call.
/// - [`DeployError::ProvisioningTimeout`] if the droplet never reports both
///   addresses within `policy.max_attempts` polls.
/// - [`DeployError::Cancelled`] if `cancel` fires while waiting.
pub async fn deploy(
    cloud: &dyn CloudProvider,
    config: &InstanceConfig,
    credentials: CredentialPair,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    reporter: &dyn ProgressReporter,
) -> Result<InstanceHandle, DeployError> {
    config.validate()?;
    let user_data = render_user_data(config, credentials.authorized_key())?;

    let volume_name = config.volume_name();
    reporter.step(&format!("creating {} GB volume {volume_name}...", config.volume_gb));
    let volume_id = cloud
        .create_volume(&config.region, &volume_name, config.volume_gb)
        .await?;
    tracing::info!(%volume_id, volume = %volume_name, region = %config.region, "volume created");

    let keys = cloud.list_ssh_keys().await?;
    tracing::debug!(count = keys.len(), "account ssh keys");

    reporter.step(&format!("creating droplet {}...", config.name));
    let spec = InstanceSpec {
        name: config.name.clone(),
        region: config.region.clone(),
        size: config.size.clone(),
        image: config.image.clone(),
        user_data,
        volume_ids: vec![volume_id],
        ssh_key_ids: keys.iter().map(|k| k.id).collect(),
        ipv6: true,
    };
    let id = cloud.create_instance(&spec).await?;
    tracing::info!(droplet_id = id, name = %config.name, "droplet created");

    let mut handle = InstanceHandle::new(id, credentials);
    reporter.step("waiting for droplet network...");
    for attempt in 1..=policy.max_attempts {
        pause(policy, attempt, cancel).await?;
        let seen = cloud.get_instance(id).await?;
        handle.update_addresses(seen);
        if handle.is_network_ready() {
            tracing::info!(droplet_id = id, ipv4 = handle.ipv4(), ipv6 = handle.ipv6(), "droplet addressed");
            reporter.success(&format!("droplet {id} is up at {}", handle.ipv4()));
            return Ok(handle);
        }
        tracing::debug!(droplet_id = id, attempt, "droplet not yet addressed");
    }

    Err(DeployError::ProvisioningTimeout {
        instance_id: id,
        attempts: policy.max_attempts,
    })
}
