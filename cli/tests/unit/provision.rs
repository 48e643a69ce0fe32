//! `deploy`: volume, droplet and address polling against a fake provider.

#![allow(clippy::expect_used)]

use std::time::Duration;

use chaincore_installer::application::SilentReporter;
use chaincore_installer::application::services::provision::deploy;
use chaincore_installer::domain::{CredentialPair, DeployError, InstanceConfig, RetryPolicy};
use tokio_util::sync::CancellationToken;

use crate::fakes::{CloudState, DROPLET_ID, FakeCloud, IPV4, IPV6};

fn pair() -> CredentialPair {
    CredentialPair::generate_with_bits(CredentialPair::MIN_BITS).expect("keygen")
}

fn policy() -> RetryPolicy {
    RetryPolicy::linear(Duration::from_secs(1), 5)
}

#[tokio::test]
async fn deploy_returns_handle_with_both_addresses() {
    let state = CloudState::addressed_after(3);
    let cloud = FakeCloud(state.clone());
    let handle = deploy(
        &cloud,
        &InstanceConfig::default(),
        pair(),
        &RetryPolicy::linear(Duration::from_millis(1), 5),
        &CancellationToken::new(),
        &SilentReporter,
    )
    .await
    .expect("deploy");

    assert_eq!(handle.id(), DROPLET_ID);
    assert_eq!(handle.ipv4(), IPV4);
    assert_eq!(handle.ipv6(), IPV6);
    assert!(handle.credentials().is_some());
    assert_eq!(state.count("get_instance"), 4);

    let spec = &state.specs()[0];
    assert_eq!(spec.volume_ids, vec!["vol-chain-core-storage".to_string()]);
    assert_eq!(spec.image, "ubuntu-22-04-x64");
}

#[tokio::test(start_paused = true)]
async fn droplet_never_addressed_times_out() {
    let state = CloudState::addressed_after(u32::MAX);
    let cloud = FakeCloud(state.clone());
    let err = deploy(
        &cloud,
        &InstanceConfig::default(),
        pair(),
        &policy(),
        &CancellationToken::new(),
        &SilentReporter,
    )
    .await
    .expect_err("no address");

    assert!(matches!(
        err,
        DeployError::ProvisioningTimeout { instance_id: DROPLET_ID, attempts: 5 }
    ));
    assert_eq!(state.count("get_instance"), 5);
}

#[tokio::test]
async fn volume_failure_stops_before_droplet_creation() {
    let state = CloudState::new();
    *state.volume_error.lock().expect("lock") = Some("create volume: 403 Forbidden".into());
    let cloud = FakeCloud(state.clone());
    let err = deploy(
        &cloud,
        &InstanceConfig::default(),
        pair(),
        &policy(),
        &CancellationToken::new(),
        &SilentReporter,
    )
    .await
    .expect_err("api error");

    assert!(matches!(err, DeployError::ProviderApi(_)));
    assert_eq!(state.calls(), vec!["create_volume".to_string()]);
}

#[tokio::test]
async fn invalid_config_makes_no_api_calls() {
    let state = CloudState::new();
    let cloud = FakeCloud(state.clone());
    let config = InstanceConfig {
        name: "Not A Valid Name".to_string(),
        volume_gb: 0,
        ..InstanceConfig::default()
    };
    let err = deploy(
        &cloud,
        &config,
        pair(),
        &policy(),
        &CancellationToken::new(),
        &SilentReporter,
    )
    .await
    .expect_err("invalid");

    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(state.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_address_polling() {
    let state = CloudState::addressed_after(u32::MAX);
    let cloud = FakeCloud(state.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = deploy(
        &cloud,
        &InstanceConfig::default(),
        pair(),
        &policy(),
        &cancel,
        &SilentReporter,
    )
    .await
    .expect_err("cancelled");

    assert!(matches!(err, DeployError::Cancelled));
    assert_eq!(state.count("create_instance"), 1);
    assert_eq!(state.count("get_instance"), 0);
}
