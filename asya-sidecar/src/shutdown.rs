//! Graceful shutdown coordination for the sidecar.
//!
//! Grounded on the teacher's supervisor restart/backoff machinery
//! (`airssys_rt::supervisor::backoff`), repurposed here from per-actor
//! restart pacing to per-pod drain timing: a `watch` channel signals the
//! router to stop consuming, then the caller waits up to
//! `graceful_shutdown_timeout` for in-flight dispatch to finish before
//! tearing down the socket and transport.

use std::time::Duration;

use tokio::sync::watch;

/// Drives the sidecar's shutdown sequence: stop consuming, drain
/// in-flight work, then signal that teardown may proceed.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that allows `drain_timeout` for in-flight
    /// work to finish once shutdown is requested.
    pub fn new(drain_timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx,
            rx,
            drain_timeout,
        }
    }

    /// A receiver the consume loop polls to know when to stop accepting
    /// new work. Cheap to clone.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// True once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }

    /// Signals shutdown; idempotent.
    pub fn request_shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// Waits for process-level shutdown signals (Ctrl-C or SIGTERM) and
    /// requests shutdown when one arrives.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            {
                Ok(signal) => signal,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    self.request_shutdown();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        self.request_shutdown();
    }

    /// Runs `in_flight` to completion, but no longer than `drain_timeout`
    /// past the point shutdown was requested.
    pub async fn drain<F: std::future::Future<Output = ()>>(&self, in_flight: F) {
        if tokio::time::timeout(self.drain_timeout, in_flight)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                "graceful shutdown drain timed out, forcing teardown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_shutdown_is_observed_by_subscribers() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(50));
        let mut rx = coordinator.subscribe();
        assert!(!coordinator.is_shutting_down());

        coordinator.request_shutdown();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_completes_promptly_when_work_finishes_in_time() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(200));
        coordinator.drain(async {}).await;
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_work() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(10));
        coordinator
            .drain(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
            .await;
    }
}
