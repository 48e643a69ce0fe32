//! DigitalOcean API v2 adapter for the `CloudConnector` / `CloudProvider`
//! ports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AccountKey, CloudConnector, CloudProvider, InstanceSpec};
use crate::domain::{BearerCredential, DeployError, InstanceAddresses};

pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com/v2";

/// Per-request timeout for API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Keys fetched in one page; accounts with more are not expected.
const KEYS_PER_PAGE: u32 = 200;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateVolume<'a> {
    size_gigabytes: u64,
    name: &'a str,
    region: &'a str,
    description: &'a str,
    filesystem_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct VolumeEnvelope {
    volume: VolumeBody,
}

#[derive(Debug, Deserialize)]
struct VolumeBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct KeysEnvelope {
    #[serde(default)]
    ssh_keys: Vec<KeyBody>,
}

#[derive(Debug, Deserialize)]
struct KeyBody {
    id: u64,
    #[serde(default)]
    fingerprint: String,
}

#[derive(Debug, Serialize)]
struct CreateDroplet<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: &'a [u64],
    ipv6: bool,
    user_data: &'a str,
    volumes: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: DropletBody,
}

#[derive(Debug, Deserialize)]
struct DropletBody {
    id: u64,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkBody>,
    #[serde(default)]
    v6: Vec<NetworkBody>,
}

#[derive(Debug, Deserialize)]
struct NetworkBody {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn public_address(networks: &[NetworkBody]) -> String {
    networks
        .iter()
        .find(|n| n.kind == "public")
        .map(|n| n.ip_address.clone())
        .unwrap_or_default()
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Builds [`DigitalOceanClient`]s against one API base URL.
#[derive(Debug, Clone)]
pub struct DigitalOceanConnector {
    api_base: String,
}

impl DigitalOceanConnector {
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for DigitalOceanConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl CloudConnector for DigitalOceanConnector {
    async fn connect(
        &self,
        credential: &BearerCredential,
    ) -> Result<Box<dyn CloudProvider>, DeployError> {
        Ok(Box::new(DigitalOceanClient::new(
            &self.api_base,
            credential.access_token(),
        )?))
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Authenticated API client for one access token.
pub struct DigitalOceanClient {
    http: Client,
    api_base: String,
    token: String,
}

impl DigitalOceanClient {
    /// # Errors
    ///
    /// Returns [`DeployError::ProviderApi`] if the HTTP client cannot be built.
    pub fn new(api_base: &str, token: &str) -> Result<Self, DeployError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("chaincore-installer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::ProviderApi(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(what: &str, request: RequestBuilder) -> Result<T, DeployError> {
        let response = request
            .send()
            .await
            .map_err(|e| DeployError::ProviderApi(format!("{what}: {e}")))?;
        decode(what, response).await
    }
}

async fn decode<T: DeserializeOwned>(what: &str, response: Response) -> Result<T, DeployError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();
        return Err(api_error(what, status, &message));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| DeployError::ProviderApi(format!("{what}: malformed response: {e}")))
}

fn api_error(what: &str, status: StatusCode, message: &str) -> DeployError {
    if message.is_empty() {
        DeployError::ProviderApi(format!("{what}: {status}"))
    } else {
        DeployError::ProviderApi(format!("{what}: {status}: {message}"))
    }
}

#[async_trait]
impl CloudProvider for DigitalOceanClient {
    async fn create_volume(
        &self,
        region: &str,
        name: &str,
        size_gb: u64,
    ) -> Result<String, DeployError> {
        let body = CreateVolume {
            size_gigabytes: size_gb,
            name,
            region,
            description: "Chain Core storage",
            filesystem_type: "ext4",
        };
        let env: VolumeEnvelope = Self::send("create volume", self.post("/volumes").json(&body)).await?;
        Ok(env.volume.id)
    }

    async fn list_ssh_keys(&self) -> Result<Vec<AccountKey>, DeployError> {
        let env: KeysEnvelope = Self::send(
            "list ssh keys",
            self.get(&format!("/account/keys?per_page={KEYS_PER_PAGE}")),
        )
        .await?;
        Ok(env
            .ssh_keys
            .into_iter()
            .map(|k| AccountKey {
                id: k.id,
                fingerprint: k.fingerprint,
            })
            .collect())
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> Result<u64, DeployError> {
        let body = CreateDroplet {
            name: &spec.name,
            region: &spec.region,
            size: &spec.size,
            image: &spec.image,
            ssh_keys: &spec.ssh_key_ids,
            ipv6: spec.ipv6,
            user_data: &spec.user_data,
            volumes: &spec.volume_ids,
        };
        let env: DropletEnvelope = Self::send("create droplet", self.post("/droplets").json(&body)).await?;
        Ok(env.droplet.id)
    }

    async fn get_instance(&self, id: u64) -> Result<InstanceAddresses, DeployError> {
        let env: DropletEnvelope = Self::send("get droplet", self.get(&format!("/droplets/{id}"))).await?;
        Ok(InstanceAddresses {
            ipv4: public_address(&env.droplet.networks.v4),
            ipv6: public_address(&env.droplet.networks.v6),
        })
    }
}
