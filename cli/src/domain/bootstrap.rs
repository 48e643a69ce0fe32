//! Cloud-init payload that turns a stock Ubuntu droplet into a Chain Core host.

use serde::Serialize;

use crate::domain::error::DeployError;
use crate::domain::instance::InstanceConfig;

/// Container name used by both the bootstrap and the token command.
pub const CONTAINER_NAME: &str = "chain-core";
/// Image pulled on first boot.
pub const SERVICE_IMAGE: &str = "chaincore/developer";
/// Port the Chain Core API and dashboard listen on.
pub const SERVICE_PORT: u16 = 1999;

#[derive(Debug, Serialize)]
struct CloudConfig {
    package_upgrade: bool,
    users: Vec<CloudUser>,
    packages: Vec<&'static str>,
    runcmd: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CloudUser {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sudo: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shell: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ssh_authorized_keys: Vec<String>,
}

/// Render the `#cloud-config` user data for `config`.
///
/// `authorized_key` is installed for `root`, which is the account the token
/// command runs as.
///
/// # Errors
///
/// Returns [`DeployError::Configuration`] if the key is empty or spans more
/// than one line, and [`DeployError::Credential`] if serialisation fails.
pub fn render_user_data(config: &InstanceConfig, authorized_key: &str) -> Result<String, DeployError> {
    let key = authorized_key.trim();
    if key.is_empty() {
        return Err(DeployError::Configuration("authorized key is empty".to_string()));
    }
    if key.contains(['\n', '\r']) {
        return Err(DeployError::Configuration(
            "authorized key must be a single line".to_string(),
        ));
    }

    let volume = config.volume_name();
    let device = format!("/dev/disk/by-id/scsi-0DO_Volume_{volume}");
    let mount = format!("/mnt/{volume}");

    let doc = CloudConfig {
        package_upgrade: true,
        users: vec![
            CloudUser {
                name: "root",
                sudo: None,
                groups: None,
                shell: None,
                ssh_authorized_keys: vec![key.to_string()],
            },
            CloudUser {
                name: "chaincore",
                sudo: Some(vec!["ALL=(ALL) NOPASSWD:ALL"]),
                groups: Some("sudo"),
                shell: Some("/bin/bash"),
                ssh_authorized_keys: Vec::new(),
            },
        ],
        packages: vec!["docker.io"],
        runcmd: vec![
            format!("mkfs.ext4 -F {device}"),
            format!("mkdir -p {mount}"),
            format!("mount -o discard,defaults {device} {mount}"),
            format!("echo '{device} {mount} ext4 defaults,nofail,discard 0 0' >> /etc/fstab"),
            format!(
                "docker run -d --name {CONTAINER_NAME} --restart unless-stopped \
                 -p {SERVICE_PORT}:{SERVICE_PORT} \
                 -v {mount}/postgresql/data:/var/lib/postgresql/data {SERVICE_IMAGE}"
            ),
        ],
    };

    let body = serde_yaml::to_string(&doc).map_err(|e| DeployError::Credential(e.to_string()))?;
    Ok(format!("#cloud-config\n{body}"))
}
