use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one deployment job.
///
/// States advance strictly in declaration order. `Failed` may be entered
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    PendingAuth,
    Provisioning,
    WaitingForShell,
    WaitingForService,
    ExtractingToken,
    Done,
    Failed,
}

impl JobState {
    /// All states in pipeline order, `Failed` last.
    pub const ALL: [JobState; 7] = [
        JobState::PendingAuth,
        JobState::Provisioning,
        JobState::WaitingForShell,
        JobState::WaitingForService,
        JobState::ExtractingToken,
        JobState::Done,
        JobState::Failed,
    ];

    /// `true` for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Whether a job in `self` may move to `next`.
    ///
    /// Only the immediate successor is allowed, plus `Failed` from any
    /// non-terminal state. Terminal states accept nothing.
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Failed {
            return true;
        }
        self.successor() == Some(next)
    }

    /// The next state on the success path.
    #[must_use]
    pub fn successor(self) -> Option<JobState> {
        match self {
            JobState::PendingAuth => Some(JobState::Provisioning),
            JobState::Provisioning => Some(JobState::WaitingForShell),
            JobState::WaitingForShell => Some(JobState::WaitingForService),
            JobState::WaitingForService => Some(JobState::ExtractingToken),
            JobState::ExtractingToken => Some(JobState::Done),
            JobState::Done | JobState::Failed => None,
        }
    }

    /// Wire name, identical to the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::PendingAuth => "pending_auth",
            JobState::Provisioning => "provisioning",
            JobState::WaitingForShell => "waiting_for_shell",
            JobState::WaitingForService => "waiting_for_service",
            JobState::ExtractingToken => "extracting_token",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    /// Short human description used by the CLI and the progress page.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            JobState::PendingAuth => "waiting for authorization",
            JobState::Provisioning => "provisioning droplet",
            JobState::WaitingForShell => "waiting for SSH",
            JobState::WaitingForService => "waiting for Chain Core",
            JobState::ExtractingToken => "creating client token",
            JobState::Done => "install complete",
            JobState::Failed => "install failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a job, as returned by `GET /status/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobView {
    pub id: String,
    pub state: JobState,
    /// Failure reason; set only when `state` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Public IPv4 address of the droplet once provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Chain Core client token; set only when `state` is `done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobView {
    /// Dashboard URL with the client token embedded as basic-auth credentials.
    #[must_use]
    pub fn dashboard_url(&self, port: u16) -> Option<String> {
        let ip = self.ip_address.as_deref()?;
        match self.client_token.as_deref() {
            Some(token) => Some(format!("http://{token}@{ip}:{port}/dashboard")),
            None => Some(format!("http://{ip}:{port}/dashboard")),
        }
    }
}
