//! Server configuration loaded from `INSTALLER_*` environment variables.
//!
//! Each `ServerConfig` field maps to `INSTALLER_<FIELD>`:
//!   - `INSTALLER_LISTEN_ADDR`         (default `0.0.0.0:8080`)
//!   - `INSTALLER_PUBLIC_URL`          (required)
//!   - `INSTALLER_OAUTH_CLIENT_ID`     (required)
//!   - `INSTALLER_OAUTH_CLIENT_SECRET` (required)
//!   - `INSTALLER_JOB_TIMEOUT_SECS`    (default `1800`)
//!   - `INSTALLER_JOB_RETENTION_SECS`  (optional, keep forever when unset)
//!   - `INSTALLER_DROPLET_NAME`, `INSTALLER_DROPLET_REGION`,
//!     `INSTALLER_DROPLET_SIZE`, `INSTALLER_VOLUME_GB`
//!                                     (optional droplet overrides)

use std::time::Duration;

use anyhow::{Context, Result};
use installer_common::ServerConfig;

use crate::application::InstallSettings;
use crate::domain::InstanceConfig;

pub const ENV_PREFIX: &str = "INSTALLER_";

/// Load from the process environment.
///
/// # Errors
///
/// Returns an error naming the required variables if any is missing or a
/// value does not parse.
pub fn load_server_config() -> Result<ServerConfig> {
    parse(envy::prefixed(ENV_PREFIX).from_env())
}

/// Load from explicit `(KEY, value)` pairs, keys including the prefix.
///
/// # Errors
///
/// As [`load_server_config`].
pub fn server_config_from_iter<I>(vars: I) -> Result<ServerConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    parse(envy::prefixed(ENV_PREFIX).from_iter(vars))
}

fn parse(loaded: Result<ServerConfig, envy::Error>) -> Result<ServerConfig> {
    let config = loaded.context(
        "failed to load config from INSTALLER_* env vars \
         (INSTALLER_PUBLIC_URL, INSTALLER_OAUTH_CLIENT_ID and \
         INSTALLER_OAUTH_CLIENT_SECRET are required)",
    )?;
    anyhow::ensure!(config.job_timeout_secs > 0, "INSTALLER_JOB_TIMEOUT_SECS must be positive");
    anyhow::ensure!(
        config.public_url.starts_with("http://") || config.public_url.starts_with("https://"),
        "INSTALLER_PUBLIC_URL must be an http(s) URL"
    );
    Ok(config)
}

/// Job tunables for the server, with droplet overrides applied.
///
/// # Errors
///
/// Returns an error if the overridden droplet template does not validate,
/// including once a job suffix is appended to its name.
pub fn install_settings(config: &ServerConfig) -> Result<InstallSettings> {
    let defaults = InstanceConfig::default();
    let instance = InstanceConfig {
        name: config.droplet_name.clone().unwrap_or(defaults.name),
        region: config.droplet_region.clone().unwrap_or(defaults.region),
        size: config.droplet_size.clone().unwrap_or(defaults.size),
        volume_gb: config.volume_gb.unwrap_or(defaults.volume_gb),
        ..InstanceConfig::default()
    };
    instance
        .validate_template()
        .context("invalid droplet override")?;
    Ok(InstallSettings {
        instance,
        job_timeout: Duration::from_secs(config.job_timeout_secs),
        ..InstallSettings::default()
    })
}
