//! Hand-written fakes for the application ports.
//!
//! Each fake records what it was asked to do so tests can assert on call
//! order and counts without real I/O.

#![allow(clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chaincore_installer::application::{
    AccountKey, Authorizer, CloudConnector, CloudProvider, InstallDeps, InstallSettings,
    InstanceSpec, PortProber, ProbeOutcome, RemoteShell,
};
use chaincore_installer::domain::{
    BearerCredential, CredentialPair, DeployError, InstanceAddresses, RetryPolicies, RetryPolicy,
};

pub const IPV4: &str = "203.0.113.7";
pub const IPV6: &str = "2001:db8::7";
pub const DROPLET_ID: u64 = 4242;

// ── Cloud ─────────────────────────────────────────────────────────────────────

/// Shared state behind [`FakeConnector`] and every client it hands out.
#[derive(Default)]
pub struct CloudState {
    calls: Mutex<Vec<String>>,
    specs: Mutex<Vec<InstanceSpec>>,
    /// `get_instance` calls answered with no addresses before the real ones.
    pub unaddressed_polls: AtomicU32,
    /// When set, `create_volume` fails with this message.
    pub volume_error: Mutex<Option<String>>,
}

impl CloudState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn addressed_after(polls: u32) -> Arc<Self> {
        let state = Self::default();
        state.unaddressed_polls.store(polls, Ordering::SeqCst);
        Arc::new(state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn specs(&self) -> Vec<InstanceSpec> {
        self.specs.lock().expect("lock").clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("lock").push(call.to_string());
    }
}

pub struct FakeConnector(pub Arc<CloudState>);

#[async_trait]
impl CloudConnector for FakeConnector {
    async fn connect(
        &self,
        _credential: &BearerCredential,
    ) -> Result<Box<dyn CloudProvider>, DeployError> {
        self.0.record("connect");
        Ok(Box::new(FakeCloud(Arc::clone(&self.0))))
    }
}

pub struct FakeCloud(pub Arc<CloudState>);

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn create_volume(&self, _: &str, name: &str, _: u64) -> Result<String, DeployError> {
        self.0.record("create_volume");
        if let Some(msg) = self.0.volume_error.lock().expect("lock").clone() {
            return Err(DeployError::ProviderApi(msg));
        }
        Ok(format!("vol-{name}"))
    }

    async fn list_ssh_keys(&self) -> Result<Vec<AccountKey>, DeployError> {
        self.0.record("list_ssh_keys");
        Ok(vec![
            AccountKey { id: 11, fingerprint: "aa:bb".to_string() },
            AccountKey { id: 12, fingerprint: "cc:dd".to_string() },
        ])
    }

    async fn create_instance(&self, spec: &InstanceSpec) -> Result<u64, DeployError> {
        self.0.record("create_instance");
        self.0.specs.lock().expect("lock").push(spec.clone());
        Ok(DROPLET_ID)
    }

    async fn get_instance(&self, _id: u64) -> Result<InstanceAddresses, DeployError> {
        self.0.record("get_instance");
        let pending = &self.0.unaddressed_polls;
        if pending.load(Ordering::SeqCst) > 0 {
            pending.fetch_sub(1, Ordering::SeqCst);
            return Ok(InstanceAddresses::default());
        }
        Ok(InstanceAddresses {
            ipv4: IPV4.to_string(),
            ipv6: IPV6.to_string(),
        })
    }
}

// ── Prober ────────────────────────────────────────────────────────────────────

/// Answers `NotReady` for the first `not_ready_before` probes of each port,
/// then `Open`. Ports in `never_open` stay closed.
#[derive(Default)]
pub struct FakeProber {
    pub not_ready_before: u32,
    pub never_open: Vec<u16>,
    pub fail_with: Option<String>,
    probes: Mutex<HashMap<u16, u32>>,
}

impl FakeProber {
    pub fn open() -> Self {
        Self::default()
    }

    /// `NotReady` for the first `n` probes of each port.
    pub fn ready_after(n: u32) -> Self {
        Self {
            not_ready_before: n,
            ..Self::default()
        }
    }

    /// Every probe fails with a non-retryable error.
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn never(port: u16) -> Self {
        Self {
            never_open: vec![port],
            ..Self::default()
        }
    }

    pub fn probes(&self, port: u16) -> u32 {
        self.probes.lock().expect("lock").get(&port).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PortProber for FakeProber {
    async fn probe(&self, host: &str, port: u16) -> Result<ProbeOutcome, DeployError> {
        let n = {
            let mut probes = self.probes.lock().expect("lock");
            let n = probes.entry(port).or_insert(0);
            *n += 1;
            *n
        };
        if let Some(reason) = &self.fail_with {
            return Err(DeployError::Probe {
                host: host.to_string(),
                port,
                reason: reason.clone(),
            });
        }
        if self.never_open.contains(&port) || n <= self.not_ready_before {
            return Ok(ProbeOutcome::NotReady);
        }
        Ok(ProbeOutcome::Open)
    }
}

// ── Shell ─────────────────────────────────────────────────────────────────────

/// Returns a canned output, or never returns when `hang` is set.
pub struct FakeShell {
    pub output: String,
    pub hang: bool,
    commands: Mutex<Vec<(String, String)>>,
}

impl FakeShell {
    pub fn printing(output: &str) -> Self {
        Self {
            output: output.to_string(),
            hang: false,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::printing("")
        }
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().expect("lock").clone()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn run(
        &self,
        host: &str,
        credentials: &CredentialPair,
        command: &str,
        _timeout: Duration,
    ) -> Result<String, DeployError> {
        assert!(credentials.authorized_key().starts_with("ssh-rsa "));
        self.commands
            .lock()
            .expect("lock")
            .push((host.to_string(), command.to_string()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.output.clone())
    }
}

// ── Authorizer ────────────────────────────────────────────────────────────────

/// Grants `scope` for any code and records every revoked token.
pub struct RecordingAuthorizer {
    pub scope: String,
    revoked: Mutex<Vec<String>>,
}

impl RecordingAuthorizer {
    pub fn granting(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            revoked: Mutex::new(Vec::new()),
        }
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Authorizer for RecordingAuthorizer {
    fn authorize_url(&self, state: &str) -> Result<String, DeployError> {
        Ok(format!(
            "https://cloud.digitalocean.com/v1/oauth/authorize?response_type=code&state={state}"
        ))
    }

    async fn exchange(&self, code: &str) -> Result<BearerCredential, DeployError> {
        if code == "bad" {
            return Err(DeployError::Authorization("token endpoint returned 401 Unauthorized".into()));
        }
        Ok(BearerCredential::new(format!("token-{code}"), self.scope.clone()))
    }

    async fn revoke(&self, credential: BearerCredential) -> Result<(), DeployError> {
        self.revoked
            .lock()
            .expect("lock")
            .push(credential.access_token().to_string());
        Ok(())
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

pub const TOKEN_OUTPUT: &str = "do:0123456789abcdef\n";

pub fn deps(cloud: &Arc<CloudState>, shell: Arc<FakeShell>, prober: Arc<FakeProber>) -> InstallDeps {
    InstallDeps {
        connector: Arc::new(FakeConnector(Arc::clone(cloud))),
        shell,
        prober,
    }
}

/// Millisecond retry budgets and the smallest accepted key size.
pub fn fast_settings() -> InstallSettings {
    let step = Duration::from_millis(1);
    InstallSettings {
        policies: RetryPolicies {
            address: RetryPolicy::linear(step, 5),
            shell: RetryPolicy::fixed(step, 5),
            service: RetryPolicy::linear(step, 4),
        },
        key_bits: CredentialPair::MIN_BITS,
        ..InstallSettings::default()
    }
}

pub fn full_scope(token: &str) -> BearerCredential {
    BearerCredential::new(token, "read write")
}
