//! Retry policy shared by the address poller and the port prober.

use std::time::Duration;

/// Spacing between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `attempt × base`: 1×, 2×, 3×, ...
    Linear(Duration),
    /// The same interval before every attempt.
    Fixed(Duration),
}

/// Bounded retry budget: a hard attempt ceiling plus a backoff function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub const fn linear(base: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(base),
        }
    }

    #[must_use]
    pub const fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(interval),
        }
    }

    /// Delay associated with the 1-based `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear(base) => base.saturating_mul(attempt),
            Backoff::Fixed(interval) => interval,
        }
    }

    /// Upper bound on the time spent sleeping across a whole budget when a
    /// delay is taken before every attempt.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        (1..=self.max_attempts).fold(Duration::ZERO, |acc, n| acc.saturating_add(self.delay(n)))
    }
}

/// Retry budgets for the three polling loops of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    /// Polling the provider until the droplet has both addresses.
    pub address: RetryPolicy,
    /// Waiting for port 22.
    pub shell: RetryPolicy,
    /// Waiting for the Chain Core port.
    pub service: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            address: RetryPolicy::linear(Duration::from_secs(1), 10),
            shell: RetryPolicy::fixed(Duration::from_secs(5), 15),
            // Cloud-init upgrades packages and pulls the image before the
            // service port opens.
            service: RetryPolicy::linear(Duration::from_secs(5), 15),
        }
    }
}
