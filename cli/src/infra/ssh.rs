//! `RemoteShell` adapter over the system OpenSSH client.
//!
//! The job's private key is written to a 0600 temp file that lives exactly as
//! long as one `ssh` invocation. Host keys are not verified: the droplet was
//! created seconds ago by this process and has no known key yet.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::application::ports::{CommandRunner, RemoteShell};
use crate::domain::{CredentialPair, DeployError};

/// Exit status `ssh` reserves for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Cap on `ConnectTimeout`; the remaining budget covers the command itself.
const MAX_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const REMOTE_USER: &str = "root";

/// Production `RemoteShell`.
pub struct OpenSshShell {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl OpenSshShell {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "ssh".to_string(),
        }
    }

    /// Use a different client binary, e.g. an absolute path.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Arguments for one non-interactive session.
#[must_use]
pub fn ssh_args(identity: &str, host: &str, connect_timeout: Duration, command: &str) -> Vec<String> {
    let connect_secs = connect_timeout.as_secs().clamp(1, MAX_CONNECT_TIMEOUT_SECS);
    let mut args: Vec<String> = vec!["-i".to_string(), identity.to_string()];
    for opt in [
        "IdentitiesOnly=yes".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "BatchMode=yes".to_string(),
        "LogLevel=ERROR".to_string(),
        format!("ConnectTimeout={connect_secs}"),
    ] {
        args.push("-o".to_string());
        args.push(opt);
    }
    args.push(format!("{REMOTE_USER}@{host}"));
    args.push(command.to_string());
    args
}

fn write_identity(credentials: &CredentialPair) -> Result<tempfile::NamedTempFile> {
    let pem = credentials.private_key_pem()?;
    let mut file = tempfile::Builder::new()
        .prefix("chaincore-id-")
        .tempfile()
        .context("create identity file")?;
    set_permissions(file.path(), 0o600)?;
    file.write_all(pem.as_bytes()).context("write identity file")?;
    file.flush().context("flush identity file")?;
    Ok(file)
}

#[cfg(unix)]
fn set_permissions(path: &std::path::Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &std::path::Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut out = String::from_utf8_lossy(stdout).into_owned();
    out.push_str(&String::from_utf8_lossy(stderr));
    out.trim().to_string()
}

#[async_trait]
impl RemoteShell for OpenSshShell {
    async fn run(
        &self,
        host: &str,
        credentials: &CredentialPair,
        command: &str,
        timeout: Duration,
    ) -> Result<String, DeployError> {
        let identity = write_identity(credentials)
            .map_err(|e| DeployError::RemoteExecution(format!("preparing ssh identity: {e:#}")))?;
        let identity_path = identity.path().to_string_lossy().into_owned();
        let args = ssh_args(&identity_path, host, timeout, command);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        tracing::debug!(host, command, timeout_secs = timeout.as_secs(), "running remote command");
        let output = self
            .runner
            .run_with_timeout(&self.program, &arg_refs, timeout)
            .await
            .map_err(|e| DeployError::RemoteExecution(format!("ssh {REMOTE_USER}@{host}: {e:#}")))?;
        drop(identity);

        let text = combined_output(&output.stdout, &output.stderr);
        match output.status.code() {
            Some(0) => Ok(text),
            Some(SSH_TRANSPORT_FAILURE) => Err(DeployError::RemoteExecution(format!(
                "ssh {REMOTE_USER}@{host} failed: {text}"
            ))),
            _ => Err(DeployError::RemoteExecution(text)),
        }
    }
}
