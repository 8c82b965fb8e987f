//! Cooperative shutdown token.
//!
//! SIGINT and SIGTERM both flip a single watch flag; every suspension
//! point in the process (poll interval, backoff wait, health server)
//! observes the same token. Nothing aborts an in-flight request — waits
//! unwind and no new cycle starts.

use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { rx, tx }
    }

    /// Flip the flag. Idempotent; later calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the token trips. Returns immediately if it already has.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // wait_for returns immediately when the current value matches.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Interruptible sleep shared by the poll-interval and backoff waits.
    /// Returns `true` if the full duration elapsed, `false` if shutdown
    /// interrupted it.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Trip the token on SIGINT or SIGTERM.
pub async fn listen_for_signals(shutdown: Shutdown) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(err) => {
                tracing::error!(error=%err, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                shutdown.trigger();
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => tracing::info!("SIGINT received; initiating graceful shutdown"),
            _ = sigterm.recv() => tracing::info!("SIGTERM received; initiating graceful shutdown"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("interrupt received; initiating graceful shutdown");
    }

    shutdown.trigger();
}
