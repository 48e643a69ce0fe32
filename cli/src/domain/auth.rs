//! Bearer credential for the provider API.

use crate::domain::error::DeployError;

/// Scope the installer needs: it creates volumes and droplets.
pub const REQUIRED_SCOPE: &str = "read write";

/// OAuth access token plus the scope it was granted with.
///
/// Not `Clone`: the job state machine owns it and hands it to
/// `Authorizer::revoke` exactly once.
pub struct BearerCredential {
    access_token: String,
    scope: String,
}

impl BearerCredential {
    #[must_use]
    pub fn new(access_token: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            scope: scope.into(),
        }
    }

    /// A personal access token from the user's account settings. These carry
    /// whatever scope the user picked, which the API enforces on each call.
    #[must_use]
    pub fn personal(access_token: impl Into<String>) -> Self {
        Self::new(access_token, REQUIRED_SCOPE)
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Every space-separated scope in `required` was granted.
    #[must_use]
    pub fn has_scope(&self, required: &str) -> bool {
        let granted: Vec<&str> = self.scope.split_whitespace().collect();
        required.split_whitespace().all(|s| granted.contains(&s))
    }

    /// # Errors
    ///
    /// Returns [`DeployError::Authorization`] if the token is empty or lacks
    /// [`REQUIRED_SCOPE`].
    pub fn require_scope(&self) -> Result<(), DeployError> {
        if self.access_token.trim().is_empty() {
            return Err(DeployError::Authorization("missing access token".to_string()));
        }
        if !self.has_scope(REQUIRED_SCOPE) {
            return Err(DeployError::Authorization(format!(
                "need {REQUIRED_SCOPE} OAuth scope"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential")
            .field("access_token", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}
