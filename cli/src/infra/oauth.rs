//! DigitalOcean OAuth2 authorization-code flow (`Authorizer` port).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::application::ports::Authorizer;
use crate::domain::auth::REQUIRED_SCOPE;
use crate::domain::{BearerCredential, DeployError};

pub const DEFAULT_OAUTH_BASE: &str = "https://cloud.digitalocean.com/v1/oauth";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth application registration.
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    scope: String,
}

/// Production `Authorizer`.
pub struct DigitalOceanAuthorizer {
    http: Client,
    base: String,
    app: OAuthApp,
}

impl DigitalOceanAuthorizer {
    /// # Errors
    ///
    /// Returns [`DeployError::Authorization`] if the HTTP client cannot be
    /// built.
    pub fn new(base: impl Into<String>, app: OAuthApp) -> Result<Self, DeployError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeployError::Authorization(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            app,
        })
    }
}

#[async_trait]
impl Authorizer for DigitalOceanAuthorizer {
    fn authorize_url(&self, state: &str) -> Result<String, DeployError> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.base),
            &[
                ("response_type", "code"),
                ("client_id", self.app.client_id.as_str()),
                ("state", state),
                ("scope", REQUIRED_SCOPE),
                ("redirect_uri", self.app.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| DeployError::Configuration(format!("invalid OAuth base URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<BearerCredential, DeployError> {
        let response = self
            .http
            .post(format!("{}/token", self.base))
            .query(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DeployError::Authorization(format!("token exchange: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::Authorization(format!(
                "token endpoint returned {status}"
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeployError::Authorization(format!("err decoding access token grant: {e}")))?;
        if body.access_token.is_empty() {
            return Err(DeployError::Authorization("missing access token".to_string()));
        }
        tracing::debug!(scope = %body.scope, "authorization code exchanged");
        Ok(BearerCredential::new(body.access_token, body.scope))
    }

    async fn revoke(&self, credential: BearerCredential) -> Result<(), DeployError> {
        let response = self
            .http
            .post(format!("{}/revoke", self.base))
            .bearer_auth(credential.access_token())
            .form(&[("token", credential.access_token())])
            .send()
            .await
            .map_err(|e| DeployError::Authorization(format!("revoke: {e}")))?;
        if response.status() != StatusCode::OK {
            return Err(DeployError::Authorization(format!(
                "revoke endpoint returned {} status code",
                response.status().as_u16()
            )));
        }
        tracing::debug!("access token revoked");
        Ok(())
    }
}
