//! Network infrastructure: implements `PortProber` with `tokio::net`.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::application::ports::{PortProber, ProbeOutcome};
use crate::domain::DeployError;

/// Per-attempt connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Production prober. The probe connection is closed as soon as it opens.
pub struct TokioPortProber {
    connect_timeout: Duration,
}

impl TokioPortProber {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TokioPortProber {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT)
    }
}

/// Errors a freshly booting host produces while its service is not up yet.
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

#[async_trait]
impl PortProber for TokioPortProber {
    async fn probe(&self, host: &str, port: u16) -> Result<ProbeOutcome, DeployError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Err(_) => Ok(ProbeOutcome::NotReady),
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(ProbeOutcome::Open)
            }
            Ok(Err(e)) if is_transient(e.kind()) => {
                tracing::trace!(host, port, error = %e, "probe not ready");
                Ok(ProbeOutcome::NotReady)
            }
            Ok(Err(e)) => Err(DeployError::Probe {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            }),
        }
    }
}
