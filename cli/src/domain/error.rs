//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use installer_common::JobState;
use thiserror::Error;

// ── Deployment errors ─────────────────────────────────────────────────────────

/// Every way a deployment step can fail.
///
/// The `Display` text of a variant is what a failed job reports as its
/// reason, so `RemoteExecution` carries the remote output verbatim.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("provider API error: {0}")]
    ProviderApi(String),

    #[error("timeout waiting for provisioning of droplet {instance_id} after {attempts} attempts")]
    ProvisioningTimeout { instance_id: u64, attempts: u32 },

    #[error("timeout waiting for {host}:{port} after {attempts} attempts")]
    ReadinessTimeout {
        host: String,
        port: u16,
        attempts: u32,
    },

    #[error("probing {host}:{port} failed: {reason}")]
    Probe {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("{0}")]
    RemoteExecution(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("credential generation failed: {0}")]
    Credential(String),

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded after {0}s")]
    DeadlineExceeded(u64),
}

impl DeployError {
    /// Stable machine-readable code for JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ProviderApi(_) => "provider_api_error",
            Self::ProvisioningTimeout { .. } => "provisioning_timeout",
            Self::ReadinessTimeout { .. } => "readiness_timeout",
            Self::Probe { .. } => "probe_error",
            Self::RemoteExecution(_) => "remote_execution_error",
            Self::Authorization(_) => "authorization_error",
            Self::Credential(_) => "credential_error",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }
}

// ── Job errors ────────────────────────────────────────────────────────────────

/// Errors raised by the job registry and the installer front door.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} already exists")]
    Duplicate(String),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {0} has already started")]
    AlreadyStarted(String),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobState,
        to: JobState,
    },

    #[error(transparent)]
    Rejected(#[from] DeployError),
}

impl JobError {
    /// Stable machine-readable code for JSON output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate_job",
            Self::NotFound(_) => "job_not_found",
            Self::AlreadyStarted(_) => "job_already_started",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Rejected(e) => e.code(),
        }
    }
}
