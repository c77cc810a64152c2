//! Idempotent scale-up on observed activity.

use drowse_cloud::{CloudError, Orchestrator};
use drowse_core::{ActivityEvent, Config, RetryPolicy};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Consumes activity events and wakes the workload.
///
/// The launcher holds no state of its own; the orchestration API's
/// desired count is the only thing it reads or writes, which is what
/// makes concurrent duplicate deliveries harmless.
#[derive(Debug)]
pub struct Launcher<O> {
    orchestrator: O,
    service: String,
    retry: RetryPolicy,
}

impl<O: Orchestrator> Launcher<O> {
    pub fn new(config: &Config, orchestrator: O) -> Self {
        Self {
            orchestrator,
            service: config.service.clone(),
            retry: RetryPolicy::default(),
        }
    }

    /// Handle one observed resolution attempt.
    ///
    /// Reads the current desired count and requests 1 if it is 0.
    /// A duplicate event while the workload is already up (or already
    /// requested) is a logged no-op. Two concurrent handlers may both
    /// observe 0 and both request 1; the second request is absorbed by
    /// the orchestration API.
    pub async fn handle_event(&self, event: &ActivityEvent) -> Result<(), CloudError> {
        let desired = self
            .retry
            .retry("describe desired count", || self.orchestrator.desired_count())
            .await?;

        if desired > 0 {
            debug!(service = %self.service, desired, "workload already requested, nothing to do");
            return Ok(());
        }

        info!(
            service = %self.service,
            hostname = %event.hostname,
            "resolution attempt observed while stopped, waking workload"
        );
        self.retry
            .retry("scale up", || self.orchestrator.set_desired_count(1))
            .await?;
        Ok(())
    }

    /// Consume the event channel until it closes or shutdown is signalled.
    ///
    /// A scale-up that fails even after retries is dropped here; the
    /// next matching event starts a fresh attempt.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ActivityEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(service = %self.service, "launcher started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(error) = self.handle_event(&event).await {
                            warn!(%error, "scale-up failed, next event will retry");
                        }
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        info!("launcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use drowse_cloud::MemoryOrchestrator;

    fn test_config() -> Config {
        Config::from_vars(
            [
                ("CLUSTER", "game-cluster"),
                ("SERVICE", "game-service"),
                ("DNSZONE", "Z1"),
                ("SERVERNAME", "mc.example.com"),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scales_up_from_zero() {
        let orchestrator = MemoryOrchestrator::new();
        let launcher = Launcher::new(&test_config(), orchestrator.clone());

        launcher
            .handle_event(&ActivityEvent::now("mc.example.com"))
            .await
            .unwrap();

        assert_eq!(orchestrator.desired(), 1);
        assert_eq!(orchestrator.set_call_log(), vec![1]);
    }

    #[tokio::test]
    async fn duplicate_event_is_a_noop() {
        let orchestrator = MemoryOrchestrator::with_desired(1);
        let launcher = Launcher::new(&test_config(), orchestrator.clone());

        launcher
            .handle_event(&ActivityEvent::now("mc.example.com"))
            .await
            .unwrap();

        assert_eq!(orchestrator.desired(), 1);
        assert!(orchestrator.set_call_log().is_empty());
    }

    #[tokio::test]
    async fn concurrent_duplicates_converge_to_one() {
        let orchestrator = MemoryOrchestrator::new();
        let launcher = Arc::new(Launcher::new(&test_config(), orchestrator.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let launcher = launcher.clone();
            handles.push(tokio::spawn(async move {
                launcher
                    .handle_event(&ActivityEvent::now("mc.example.com"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Convergence is the contract: every request that was issued
        // asked for 1, and the final state is 1.
        assert_eq!(orchestrator.desired(), 1);
        assert!(orchestrator.set_call_log().iter().all(|&n| n == 1));
        assert!(!orchestrator.set_call_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_through_throttling() {
        let orchestrator = MemoryOrchestrator::new();
        orchestrator.fail_next_sets(2);
        let launcher = Launcher::new(&test_config(), orchestrator.clone());

        launcher
            .handle_event(&ActivityEvent::now("mc.example.com"))
            .await
            .unwrap();
        assert_eq!(orchestrator.desired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_scale_up_does_not_kill_the_feed() {
        let orchestrator = MemoryOrchestrator::new();
        orchestrator.fail_next_sets(100);
        let launcher = Launcher::new(&test_config(), orchestrator.clone());

        let (events_tx, events_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        events_tx
            .send(ActivityEvent::now("mc.example.com"))
            .await
            .unwrap();
        drop(events_tx);

        // The run loop logs the failure and exits cleanly on channel close.
        tokio::time::timeout(Duration::from_secs(300), launcher.run(events_rx, shutdown_rx))
            .await
            .unwrap();
        assert_eq!(orchestrator.desired(), 0);
    }
}
