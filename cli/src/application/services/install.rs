//! Application service: the end-to-end install pipeline and the job engine
//! that runs it in the background.
//!
//! One pipeline run generates a key pair, provisions a droplet, waits for SSH
//! and for Chain Core, then mints a client token. The CLI runs it in the
//! foreground; the web server wraps each run in a [`Job`] on its own task.

use std::sync::Arc;
use std::time::Duration;

use installer_common::{JobState, JobView};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::application::ports::{
    Authorizer, CloudConnector, PortProber, ProgressReporter, RemoteShell, SilentReporter,
};
use crate::application::registry::{Job, JobId, JobRegistry};
use crate::application::services::provision::deploy;
use crate::application::services::readiness::wait_for_port;
use crate::application::services::token::create_client_token;
use crate::domain::bootstrap::SERVICE_PORT;
use crate::domain::{
    BearerCredential, CredentialPair, DeployError, InstanceConfig, JobError, RetryPolicies,
};

/// SSH port probed before the service port.
pub const SHELL_PORT: u16 = 22;

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Adapters one pipeline run talks to.
#[derive(Clone)]
pub struct InstallDeps {
    pub connector: Arc<dyn CloudConnector>,
    pub shell: Arc<dyn RemoteShell>,
    pub prober: Arc<dyn PortProber>,
}

/// Tunables shared by every run.
#[derive(Debug, Clone)]
pub struct InstallSettings {
    /// Droplet template. Server jobs append the job id prefix to its name.
    pub instance: InstanceConfig,
    pub policies: RetryPolicies,
    /// Overall deadline for one run, covering every step.
    pub job_timeout: Duration,
    pub key_bits: usize,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            instance: InstanceConfig::default(),
            policies: RetryPolicies::default(),
            job_timeout: Duration::from_secs(1800),
            key_bits: CredentialPair::DEFAULT_BITS,
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub droplet_id: u64,
    pub ipv4: String,
    pub ipv6: String,
    pub client_token: String,
}

/// Receives pipeline progress.
///
/// A returned error aborts the run. [`Job`] rejects updates once it is
/// terminal, which stops a run whose job was already failed.
pub trait InstallObserver: Send + Sync {
    /// The pipeline is about to perform the work of `state`.
    fn entered(&self, state: JobState) -> Result<(), JobError>;
    /// The droplet's IPv4 address is known.
    fn addressed(&self, ipv4: &str) -> Result<(), JobError>;
}

impl InstallObserver for Job {
    fn entered(&self, state: JobState) -> Result<(), JobError> {
        // Provisioning is entered by the claim in `Installer::start`.
        if state == JobState::Provisioning && self.state() == JobState::Provisioning {
            return Ok(());
        }
        self.advance(state)
    }

    fn addressed(&self, ipv4: &str) -> Result<(), JobError> {
        self.record_address(ipv4)
    }
}

/// Forwards state changes to a [`ProgressReporter`].
pub struct ReportingObserver<'a>(pub &'a dyn ProgressReporter);

impl InstallObserver for ReportingObserver<'_> {
    fn entered(&self, state: JobState) -> Result<(), JobError> {
        self.0.step(&format!("{}...", state.describe()));
        Ok(())
    }

    fn addressed(&self, ipv4: &str) -> Result<(), JobError> {
        self.0.success(&format!("droplet reachable at {ipv4}"));
        Ok(())
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run `fut` until it finishes, `cancel` fires, or `timeout` elapses.
///
/// # Errors
///
/// Whatever `fut` returns, or [`DeployError::Cancelled`] /
/// [`DeployError::DeadlineExceeded`].
pub async fn run_bounded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<T, JobError>
where
    F: std::future::Future<Output = Result<T, JobError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DeployError::Cancelled.into()),
        res = tokio::time::timeout(timeout, fut) => {
            res.unwrap_or_else(|_| Err(DeployError::DeadlineExceeded(timeout.as_secs()).into()))
        }
    }
}

/// One full install: key pair, droplet, both readiness waits, client token.
///
/// `deadline` bounds the SSH session of the token step. The key pair is
/// released once the token step has run, whatever its outcome; on earlier
/// errors it is dropped with the instance handle.
///
/// # Errors
///
/// The first step error, wrapped in [`JobError::Rejected`], or the observer's
/// error.
#[allow(clippy::too_many_arguments)]
pub async fn install(
    deps: &InstallDeps,
    credential: &BearerCredential,
    config: &InstanceConfig,
    settings: &InstallSettings,
    cancel: &CancellationToken,
    deadline: Instant,
    observer: &dyn InstallObserver,
    reporter: &dyn ProgressReporter,
) -> Result<InstallOutcome, JobError> {
    observer.entered(JobState::Provisioning)?;
    config.validate()?;

    let bits = settings.key_bits;
    let pair = tokio::task::spawn_blocking(move || CredentialPair::generate_with_bits(bits))
        .await
        .map_err(|e| DeployError::Credential(e.to_string()))??;
    tracing::debug!(bits, "credential pair generated");

    let cloud = deps.connector.connect(credential).await?;
    let mut instance = deploy(
        cloud.as_ref(),
        config,
        pair,
        &settings.policies.address,
        cancel,
        reporter,
    )
    .await?;
    observer.addressed(instance.ipv4())?;

    observer.entered(JobState::WaitingForShell)?;
    wait_for_port(
        deps.prober.as_ref(),
        instance.ipv4(),
        SHELL_PORT,
        &settings.policies.shell,
        cancel,
    )
    .await?;

    observer.entered(JobState::WaitingForService)?;
    wait_for_port(
        deps.prober.as_ref(),
        instance.ipv4(),
        SERVICE_PORT,
        &settings.policies.service,
        cancel,
    )
    .await?;

    observer.entered(JobState::ExtractingToken)?;
    let remaining = deadline.saturating_duration_since(Instant::now());
    let token = create_client_token(deps.shell.as_ref(), &instance, remaining).await;
    instance.release_credentials();
    let client_token = token?;

    Ok(InstallOutcome {
        droplet_id: instance.id(),
        ipv4: instance.ipv4().to_string(),
        ipv6: instance.ipv6().to_string(),
        client_token,
    })
}

/// Drive `job` from `provisioning` to a terminal state, then revoke
/// `credential`. Never returns an error: every failure becomes the job's
/// `failed` reason.
pub async fn run_install(
    job: Arc<Job>,
    credential: BearerCredential,
    deps: InstallDeps,
    authorizer: Arc<dyn Authorizer>,
    settings: InstallSettings,
    cancel: CancellationToken,
) -> JobView {
    let job_id = job.id().clone();
    let config = settings.instance.for_job(job_id.as_str());
    let deadline = Instant::now() + settings.job_timeout;
    tracing::info!(job_id = %job_id, droplet = %config.name, "install started");

    let outcome = run_bounded(
        &cancel,
        settings.job_timeout,
        install(
            &deps,
            &credential,
            &config,
            &settings,
            &cancel,
            deadline,
            job.as_ref(),
            &SilentReporter,
        ),
    )
    .await;

    match outcome {
        Ok(done) => match job.complete(done.client_token) {
            Ok(()) => tracing::info!(job_id = %job_id, droplet_id = done.droplet_id, "install complete"),
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "could not record completion"),
        },
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "install failed");
            if let Err(e) = job.fail(e.to_string()) {
                tracing::warn!(job_id = %job_id, error = %e, "could not record failure");
            }
        }
    }

    if let Err(e) = authorizer.revoke(credential).await {
        tracing::warn!(job_id = %job_id, error = %e, "failed to revoke access token");
    }
    job.snapshot()
}

// ── Installer ─────────────────────────────────────────────────────────────────

/// Front door of the job engine: opens jobs, starts them on background
/// tasks and answers status queries.
pub struct Installer {
    registry: Arc<JobRegistry>,
    deps: InstallDeps,
    authorizer: Arc<dyn Authorizer>,
    settings: InstallSettings,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Installer {
    /// `shutdown` is the parent of every job's cancellation token.
    #[must_use]
    pub fn new(
        registry: Arc<JobRegistry>,
        deps: InstallDeps,
        authorizer: Arc<dyn Authorizer>,
        settings: InstallSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            deps,
            authorizer,
            settings,
            shutdown,
            tasks: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    /// Create a `pending_auth` job.
    ///
    /// # Errors
    ///
    /// [`JobError::Duplicate`] on an id collision.
    pub fn open(&self) -> Result<Arc<Job>, JobError> {
        let job = self.registry.create(JobId::generate())?;
        tracing::info!(job_id = %job.id(), "job opened");
        Ok(job)
    }

    /// Claim job `id` and run it on a background task.
    ///
    /// Nothing touches the cloud provider unless the credential carries the
    /// required scope and the claim succeeds. A rejected credential is
    /// revoked in the background.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] for an unknown id.
    /// - [`JobError::Rejected`] if the credential lacks scope; the job stays
    ///   `pending_auth`.
    /// - [`JobError::AlreadyStarted`] if the job already left `pending_auth`.
    pub fn start(
        &self,
        id: &str,
        credential: BearerCredential,
    ) -> Result<JoinHandle<JobView>, JobError> {
        let Some(job) = self.registry.get(id) else {
            self.revoke_in_background(credential);
            return Err(JobError::NotFound(id.to_string()));
        };
        if let Err(e) = credential.require_scope().map_err(JobError::from).and_then(|()| job.claim())
        {
            tracing::warn!(job_id = %job.id(), error = %e, "job start rejected");
            self.revoke_in_background(credential);
            return Err(e);
        }

        Ok(self.tasks.spawn(run_install(
            job,
            credential,
            self.deps.clone(),
            Arc::clone(&self.authorizer),
            self.settings.clone(),
            self.shutdown.child_token(),
        )))
    }

    /// Open a job and start it in one go.
    ///
    /// # Errors
    ///
    /// As [`Self::open`] and [`Self::start`].
    pub fn submit(&self, credential: BearerCredential) -> Result<JobId, JobError> {
        let job = self.open()?;
        let id = job.id().clone();
        self.start(id.as_str(), credential)?;
        Ok(id)
    }

    #[must_use]
    pub fn status(&self, id: &str) -> Option<JobView> {
        self.registry.snapshot(id)
    }

    /// Cancel every running job and wait up to `grace` for them to record
    /// their outcome and revoke their credentials.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(running = self.tasks.len(), "jobs still running at shutdown");
        }
    }

    fn revoke_in_background(&self, credential: BearerCredential) {
        let authorizer = Arc::clone(&self.authorizer);
        self.tasks.spawn(async move {
            if let Err(e) = authorizer.revoke(credential).await {
                tracing::warn!(error = %e, "failed to revoke rejected access token");
            }
        });
    }
}
