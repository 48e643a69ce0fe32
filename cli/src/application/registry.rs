//! In-memory job registry.
//!
//! The registry and every job carry their own `std::sync::Mutex`. Locks are
//! held only for map or field operations and never across an `.await`, so a
//! status query never waits on a running deployment step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use installer_common::{JobState, JobView};
use rand::RngCore;

use crate::domain::JobError;

/// Random bytes in a job id.
const JOB_ID_BYTES: usize = 16;

/// Failure reason of a job evicted before it was ever authorized.
pub const AUTHORIZATION_EXPIRED: &str = "authorization expired";

// ── Job id ────────────────────────────────────────────────────────────────────

/// 32 lowercase hex characters. Doubles as the OAuth `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Fresh id from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; JOB_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accept an id received from a client. `None` if malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let ok = raw.len() == JOB_ID_BYTES * 2
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        ok.then(|| Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Job ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct JobRecord {
    state: JobState,
    reason: Option<String>,
    ip_address: Option<String>,
    client_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// One tracked deployment attempt.
///
/// Only the job's own state machine mutates it after the initial claim.
/// Every mutation is validated against [`JobState::can_transition_to`]; a
/// rejected mutation leaves the record untouched.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    record: Mutex<JobRecord>,
}

impl Job {
    #[must_use]
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            record: Mutex::new(JobRecord {
                state: JobState::PendingAuth,
                reason: None,
                ip_address: None,
                client_token: None,
                created_at: now,
                updated_at: now,
                finished_at: None,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, JobRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.lock().state
    }

    fn transition(&self, rec: &mut JobRecord, to: JobState) -> Result<(), JobError> {
        if !rec.state.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                id: self.id.to_string(),
                from: rec.state,
                to,
            });
        }
        let now = Utc::now();
        rec.state = to;
        rec.updated_at = now;
        if to.is_terminal() {
            rec.finished_at = Some(now);
        }
        Ok(())
    }

    /// Move to the next state on the success path.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if `to` is not the immediate successor
    /// or the job is already terminal. Use [`Self::complete`] and
    /// [`Self::fail`] for the terminal states.
    pub fn advance(&self, to: JobState) -> Result<(), JobError> {
        if to.is_terminal() {
            let from = self.state();
            return Err(JobError::InvalidTransition {
                id: self.id.to_string(),
                from,
                to,
            });
        }
        let mut rec = self.lock();
        self.transition(&mut rec, to)
    }

    /// `pending_auth → provisioning`, atomically. Exactly one caller wins.
    ///
    /// # Errors
    ///
    /// [`JobError::AlreadyStarted`] if the job has left `pending_auth`.
    pub fn claim(&self) -> Result<(), JobError> {
        let mut rec = self.lock();
        if rec.state != JobState::PendingAuth {
            return Err(JobError::AlreadyStarted(self.id.to_string()));
        }
        self.transition(&mut rec, JobState::Provisioning)
    }

    /// Store the droplet's public IPv4 address.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal.
    pub fn record_address(&self, ip: &str) -> Result<(), JobError> {
        let mut rec = self.lock();
        if rec.state.is_terminal() {
            return Err(JobError::InvalidTransition {
                id: self.id.to_string(),
                from: rec.state,
                to: rec.state,
            });
        }
        rec.ip_address = Some(ip.to_string());
        rec.updated_at = Utc::now();
        Ok(())
    }

    /// Record the client token and `done` in one locked update, so no reader
    /// sees a token on a job that is not done.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] unless the job is `extracting_token`.
    pub fn complete(&self, client_token: String) -> Result<(), JobError> {
        let mut rec = self.lock();
        self.transition(&mut rec, JobState::Done)?;
        rec.client_token = Some(client_token);
        Ok(())
    }

    /// Move to `failed` with `reason`.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidTransition`] if the job is already terminal; the
    /// first terminal outcome wins.
    pub fn fail(&self, reason: impl Into<String>) -> Result<(), JobError> {
        let mut rec = self.lock();
        self.transition(&mut rec, JobState::Failed)?;
        rec.reason = Some(reason.into());
        Ok(())
    }

    /// Point-in-time copy for status queries.
    #[must_use]
    pub fn snapshot(&self) -> JobView {
        let rec = self.lock().clone();
        JobView {
            id: self.id.to_string(),
            state: rec.state,
            reason: rec.reason,
            ip_address: rec.ip_address,
            client_token: rec.client_token,
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        }
    }

    /// Whether the job can be dropped at `cutoff`: terminal and finished
    /// before it, or still `pending_auth` and opened before it. A stale
    /// pending job is failed under the same lock, so a caller still holding
    /// it can no longer claim it.
    fn expire_before(&self, cutoff: DateTime<Utc>) -> bool {
        let mut rec = self.lock();
        if let Some(finished) = rec.finished_at {
            return finished < cutoff;
        }
        if rec.state != JobState::PendingAuth || rec.created_at >= cutoff {
            return false;
        }
        if self.transition(&mut rec, JobState::Failed).is_err() {
            return false;
        }
        rec.reason = Some(AUTHORIZATION_EXPIRED.to_string());
        true
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Concurrent map from job id to job. Construct one per process and share it
/// as `Arc<JobRegistry>`.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<Job>>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new `pending_auth` job.
    ///
    /// # Errors
    ///
    /// [`JobError::Duplicate`] if `id` is taken; the existing job is left
    /// untouched.
    pub fn create(&self, id: JobId) -> Result<Arc<Job>, JobError> {
        let job = Arc::new(Job::new(id.clone()));
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return Err(JobError::Duplicate(id.to_string()));
        }
        jobs.insert(id, Arc::clone(&job));
        Ok(job)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        let id = JobId::parse(id)?;
        self.lock().get(&id).cloned()
    }

    /// Snapshot a job. The registry lock is released before the job lock is
    /// taken.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<JobView> {
        let job = self.get(id)?;
        Some(job.snapshot())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop terminal jobs that finished more than `older_than` ago, and
    /// `pending_auth` jobs opened more than `older_than` ago that were never
    /// authorized. Running jobs are never evicted. Returns the number removed.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let Ok(window) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(window) else {
            return 0;
        };
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !job.expire_before(cutoff));
        before - jobs.len()
    }
}
