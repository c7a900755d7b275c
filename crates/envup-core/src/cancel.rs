//! Cooperative cancellation for upgrade runs.
//!
//! A run is cancelled by an interrupt or by an overall deadline. The
//! orchestrator checks the signal between environments and the scheduler
//! races every busy-wait against it.

use std::time::Duration;

use tokio::sync::watch;

/// Sending half. Dropping it without cancelling leaves the run uncancelled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half, cheap to clone.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Cancel once `deadline` elapses. Must be called from within a tokio
    /// runtime.
    pub fn cancel_after(&self, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(deadline_secs = deadline.as_secs(), "upgrade deadline reached");
            handle.cancel();
        })
    }
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (handle, cancellation) = channel();
        drop(handle);
        cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle was dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_observed_by_clones() {
        let (handle, cancellation) = channel();
        let mut waiter = cancellation.clone();
        assert!(!cancellation.is_cancelled());

        handle.cancel();
        waiter.cancelled().await;
        assert!(cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let mut cancellation = Cancellation::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), cancellation.cancelled()).await;
        assert!(fired.is_err());
        assert!(!cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_after_fires_on_deadline() {
        let (handle, mut cancellation) = channel();
        handle.cancel_after(Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(2), cancellation.cancelled())
            .await
            .expect("deadline should cancel");
    }
}
