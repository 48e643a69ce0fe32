use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

/// Installer web server configuration.
///
/// Loaded from `INSTALLER_*` environment variables by the CLI.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Externally reachable base URL, used to build the OAuth redirect URI.
    pub public_url: String,

    /// OAuth application client id.
    pub oauth_client_id: String,

    /// OAuth application client secret.
    pub oauth_client_secret: String,

    /// Overall deadline for one job, in seconds (default: 1800).
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// How long finished jobs stay queryable. `None` keeps them until restart.
    #[serde(default)]
    pub job_retention_secs: Option<u64>,

    /// Droplet name template override. Each job appends a suffix of its id.
    #[serde(default)]
    pub droplet_name: Option<String>,

    /// Droplet region override.
    #[serde(default)]
    pub droplet_region: Option<String>,

    /// Droplet size slug override.
    #[serde(default)]
    pub droplet_size: Option<String>,

    /// Block storage volume size override, in GB.
    #[serde(default)]
    pub volume_gb: Option<u64>,
}

impl ServerConfig {
    /// OAuth redirect URI: `<public_url>/progress`.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}/progress", self.public_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("public_url", &self.public_url)
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_client_secret", &"<redacted>")
            .field("job_timeout_secs", &self.job_timeout_secs)
            .field("job_retention_secs", &self.job_retention_secs)
            .field("droplet_name", &self.droplet_name)
            .field("droplet_region", &self.droplet_region)
            .field("droplet_size", &self.droplet_size)
            .field("volume_gb", &self.volume_gb)
            .finish()
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_job_timeout_secs() -> u64 {
    1800
}
