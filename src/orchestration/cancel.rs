//! Run-wide cancellation
//!
//! A single [`Cancellation`] is created per run. Executors hold a
//! receiver and abort (killing the child process) as soon as it flips;
//! the engine and the packager check it between stages.

use crate::error::{DtlError, DtlResult};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Shared cancellation flag for every external command of a run
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel every pending and future command
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Fail with [`DtlError::Cancelled`] once the run is cancelled
    pub fn check(&self, stage: &str) -> DtlResult<()> {
        if self.is_cancelled() {
            return Err(DtlError::Cancelled {
                command: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Receiver for an executor
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Cancel the run on the first Ctrl-C
    pub fn cancel_on_ctrl_c(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping running commands");
                this.cancel();
            }
        });
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once the flag is set. Never resolves if the sender is gone
/// without cancelling.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscribers_see_cancellation() {
        let cancellation = Cancellation::new();
        let mut rx = cancellation.subscribe();
        assert!(!cancellation.is_cancelled());

        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
        assert!(cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn not_cancelled_stays_pending() {
        let cancellation = Cancellation::new();
        let mut rx = cancellation.subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(waited.is_err());
    }

    #[test]
    fn check_fails_once_cancelled() {
        let cancellation = Cancellation::new();
        assert!(cancellation.check("packaging").is_ok());

        cancellation.clone().cancel();
        let err = cancellation.check("packaging").unwrap_err();
        assert_eq!(err.to_string(), "packaging was cancelled");
    }
}
