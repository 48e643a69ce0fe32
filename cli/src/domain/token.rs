//! Client token extraction from `corectl` output.

use crate::domain::bootstrap::CONTAINER_NAME;
use crate::domain::error::DeployError;

/// Every token minted for the installer carries this prefix.
pub const TOKEN_SENTINEL: &str = "do:";

/// Command run as `root` on the droplet to mint a client token.
#[must_use]
pub fn token_command() -> String {
    format!("docker exec {CONTAINER_NAME} /usr/bin/chain/corectl create-token do")
}

/// Validate combined command output and return the token.
///
/// # Errors
///
/// Returns [`DeployError::RemoteExecution`] carrying the trimmed output when
/// it does not start with [`TOKEN_SENTINEL`].
pub fn parse_token_output(output: &str) -> Result<String, DeployError> {
    let trimmed = output.trim();
    if trimmed.starts_with(TOKEN_SENTINEL) {
        Ok(trimmed.to_string())
    } else {
        Err(DeployError::RemoteExecution(trimmed.to_string()))
    }
}
