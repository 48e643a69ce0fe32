//! Command implementations

pub mod deploy;
pub mod serve;
pub mod status;
pub mod version;

use tokio_util::sync::CancellationToken;

/// Fire `cancel` on Ctrl-C. Returns early if `cancel` fires first.
pub async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => tracing::info!("received shutdown signal"),
                Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl-C"),
            }
            cancel.cancel();
        }
    }
}
