//! Droplet configuration and the handle of a provisioned droplet.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::credentials::CredentialPair;
use crate::domain::error::DeployError;

/// Droplet names double as hostnames and as part of the volume name, and
/// volume names must start with a letter.
pub static INSTANCE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Constant pattern; cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z]([a-z0-9-]{0,53}[a-z0-9])?$").expect("valid regex")
});

/// Region and size slugs as used by the provider API.
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid regex")
});

pub const DEFAULT_INSTANCE_NAME: &str = "chain-core";
pub const DEFAULT_REGION: &str = "sfo2";
pub const DEFAULT_SIZE: &str = "1gb";
pub const DEFAULT_VOLUME_GB: u64 = 100;
pub const DEFAULT_IMAGE: &str = "ubuntu-22-04-x64";

/// Characters of the job id appended by [`InstanceConfig::for_job`].
const JOB_SUFFIX_LEN: usize = 6;

/// Largest block storage volume the provider accepts.
const MAX_VOLUME_GB: u64 = 16 * 1024;

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub name: String,
    pub region: String,
    pub size: String,
    pub volume_gb: u64,
    pub image: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INSTANCE_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
            size: DEFAULT_SIZE.to_string(),
            volume_gb: DEFAULT_VOLUME_GB,
            image: DEFAULT_IMAGE.to_string(),
        }
    }
}

impl InstanceConfig {
    /// This configuration with the droplet name made unique to one job by
    /// appending the first six characters of its id.
    #[must_use]
    pub fn for_job(&self, job_id: &str) -> Self {
        let suffix: String = job_id.chars().take(JOB_SUFFIX_LEN).collect();
        Self {
            name: format!("{}-{suffix}", self.name),
            ..self.clone()
        }
    }

    /// Block storage volume name, derived from the droplet name.
    #[must_use]
    pub fn volume_name(&self) -> String {
        format!("{}-storage", self.name)
    }

    /// Check a template that server jobs derive their names from: the name
    /// must still validate once [`Self::for_job`] has appended its suffix.
    ///
    /// # Errors
    ///
    /// As [`Self::validate`], for the derived configuration.
    pub fn validate_template(&self) -> Result<(), DeployError> {
        self.for_job(&"0".repeat(JOB_SUFFIX_LEN)).validate()
    }

    /// Check every field before any provider call is made.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] listing every invalid field.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut errors: Vec<String> = Vec::new();
        if !INSTANCE_NAME_RE.is_match(&self.name) {
            errors.push(format!(
                "name '{}' must start with a letter and be lowercase alphanumerics and hyphens, at most 55 characters",
                self.name
            ));
        }
        if !SLUG_RE.is_match(&self.region) {
            errors.push(format!("region '{}' is not a valid slug", self.region));
        }
        if !SLUG_RE.is_match(&self.size) {
            errors.push(format!("size '{}' is not a valid slug", self.size));
        }
        if !SLUG_RE.is_match(&self.image) {
            errors.push(format!("image '{}' is not a valid slug", self.image));
        }
        if self.volume_gb == 0 || self.volume_gb > MAX_VOLUME_GB {
            errors.push(format!(
                "volume size {} GB must be between 1 and {MAX_VOLUME_GB}",
                self.volume_gb
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DeployError::Configuration(errors.join("; ")))
        }
    }
}

/// Public addresses reported by the provider for a droplet. Empty strings
/// mean "not assigned yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceAddresses {
    pub ipv4: String,
    pub ipv6: String,
}

/// A droplet the provider has acknowledged.
///
/// Holds the single-use credential pair until [`Self::release_credentials`]
/// is called or the handle is dropped.
#[derive(Debug)]
pub struct InstanceHandle {
    id: u64,
    addresses: InstanceAddresses,
    credentials: Option<CredentialPair>,
}

impl InstanceHandle {
    #[must_use]
    pub fn new(id: u64, credentials: CredentialPair) -> Self {
        Self {
            id,
            addresses: InstanceAddresses::default(),
            credentials: Some(credentials),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn ipv4(&self) -> &str {
        &self.addresses.ipv4
    }

    #[must_use]
    pub fn ipv6(&self) -> &str {
        &self.addresses.ipv6
    }

    /// Both addresses are known.
    #[must_use]
    pub fn is_network_ready(&self) -> bool {
        !self.addresses.ipv4.is_empty() && !self.addresses.ipv6.is_empty()
    }

    /// Merge a provider response; empty fields never overwrite known ones.
    pub fn update_addresses(&mut self, seen: InstanceAddresses) {
        if !seen.ipv4.is_empty() {
            self.addresses.ipv4 = seen.ipv4;
        }
        if !seen.ipv6.is_empty() {
            self.addresses.ipv6 = seen.ipv6;
        }
    }

    /// The credential pair, or `None` once released.
    #[must_use]
    pub fn credentials(&self) -> Option<&CredentialPair> {
        self.credentials.as_ref()
    }

    /// Drop the credential pair. Idempotent.
    pub fn release_credentials(&mut self) {
        self.credentials = None;
    }
}
