//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.
//!
//! Every async port is `Send + Sync` so services holding `Arc<dyn Port>` can
//! run on spawned tokio tasks.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{BearerCredential, CredentialPair, DeployError, InstanceAddresses};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Droplet creation parameters as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: String,
    /// Rendered `#cloud-config` document.
    pub user_data: String,
    pub volume_ids: Vec<String>,
    pub ssh_key_ids: Vec<u64>,
    pub ipv6: bool,
}

/// An SSH key registered on the provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKey {
    pub id: u64,
    pub fingerprint: String,
}

/// Result of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The port accepted a connection.
    Open,
    /// Transient failure: refused, timed out, reset, unreachable.
    NotReady,
}

// ── Cloud Provider Ports ──────────────────────────────────────────────────────

/// Builds an authenticated provider client for one bearer credential.
#[async_trait]
pub trait CloudConnector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DeployError::ProviderApi`] if the client cannot be built.
    async fn connect(&self, credential: &BearerCredential)
    -> Result<Box<dyn CloudProvider>, DeployError>;
}

/// The four provider calls a deployment makes.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Create a block storage volume and return its id.
    async fn create_volume(&self, region: &str, name: &str, size_gb: u64)
    -> Result<String, DeployError>;
    /// SSH keys already registered on the account.
    async fn list_ssh_keys(&self) -> Result<Vec<AccountKey>, DeployError>;
    /// Create a droplet and return its numeric id.
    async fn create_instance(&self, spec: &InstanceSpec) -> Result<u64, DeployError>;
    /// Current public addresses of a droplet. Unassigned ones are empty.
    async fn get_instance(&self, id: u64) -> Result<InstanceAddresses, DeployError>;
}

// ── Authorization Port ────────────────────────────────────────────────────────

/// OAuth2 authorization-code flow against the provider.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// URL that asks the user to grant access. `state` is echoed back on the
    /// redirect.
    fn authorize_url(&self, state: &str) -> Result<String, DeployError>;
    /// Exchange an authorization code for a bearer credential.
    async fn exchange(&self, code: &str) -> Result<BearerCredential, DeployError>;
    /// Revoke a credential. Takes ownership so it is revoked at most once.
    async fn revoke(&self, credential: BearerCredential) -> Result<(), DeployError>;
}

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// Runs one command on a droplet as `root`.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Returns combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::RemoteExecution`] on transport failure, a
    /// non-zero exit, or when `timeout` elapses.
    async fn run(
        &self,
        host: &str,
        credentials: &CredentialPair,
        command: &str,
        timeout: Duration,
    ) -> Result<String, DeployError>;
}

/// Single TCP connection attempt.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DeployError::Probe`] for failures that retrying cannot fix,
    /// such as an unresolvable host.
    async fn probe(&self, host: &str, port: u16) -> Result<ProbeOutcome, DeployError>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(&self, program: &str, args: &[&str], timeout: Duration)
    -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Reporter that discards everything. Used by server-side jobs, whose
/// progress is observed through the job record instead.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
