//! The watchdog poll loop.

use std::time::Duration;

use drowse_cloud::{
    CloudError, DnsApi, Notifier, Orchestrator, Publisher, RecordSync, WorkloadProbe,
};
use drowse_core::{Config, EventKind, RetryPolicy, WorkloadState};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::tracker::IdleTracker;

/// Drives the workload from Starting through Stopped.
///
/// One watchdog per running workload, strictly sequential. Every
/// external call is bounded by timeouts and retries so a stuck
/// dependency degrades the poll cadence instead of wedging the loop;
/// the only cancellation signal is the shutdown channel (process
/// termination in production).
pub struct Watchdog<O, D, P, W> {
    orchestrator: O,
    records: RecordSync<D>,
    notifier: Notifier<P>,
    probe: W,
    poll_interval: Duration,
    startup_grace: Duration,
    idle_timeout: Duration,
    retry: RetryPolicy,
}

impl<O, D, P, W> Watchdog<O, D, P, W>
where
    O: Orchestrator,
    D: DnsApi,
    P: Publisher,
    W: WorkloadProbe,
{
    pub fn new(
        config: &Config,
        orchestrator: O,
        records: RecordSync<D>,
        notifier: Notifier<P>,
        probe: W,
    ) -> Self {
        Self {
            orchestrator,
            records,
            notifier,
            probe,
            poll_interval: config.poll_interval,
            startup_grace: config.startup_grace,
            idle_timeout: config.idle_timeout,
            retry: RetryPolicy::default(),
        }
    }

    /// Run the full lifecycle once: wait for scale-up, watch the
    /// workload, shut it down after the idle deadline, and return once
    /// the orchestrator confirms zero running instances.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), CloudError> {
        info!(
            poll_secs = self.poll_interval.as_secs(),
            grace_min = self.startup_grace.as_secs() / 60,
            idle_min = self.idle_timeout.as_secs() / 60,
            "watchdog started"
        );

        // Stopped → Starting: wait for the launcher's scale-up request.
        // Normally immediate, since the watchdog rides the workload.
        loop {
            match self.orchestrator.desired_count().await {
                Ok(n) if n > 0 => break,
                Ok(_) => debug!(state = %WorkloadState::Stopped, "desired count still 0"),
                Err(error) => warn!(%error, "desired count query failed"),
            }
            if !self.tick(&mut shutdown).await {
                return Ok(());
            }
        }
        info!(state = %WorkloadState::Starting, "scale-up requested, waiting for instance");
        self.notifier.publish(EventKind::Starting).await;

        // Starting → Running: retries indefinitely. A hung boot is
        // surfaced through logs, never auto-killed; deciding boot-hung
        // versus idle would need knowledge the watchdog does not have.
        let started = Instant::now();
        let address = loop {
            if let Some(address) = self.discover_address().await {
                break address;
            }
            info!(
                state = %WorkloadState::Starting,
                waited_secs = started.elapsed().as_secs(),
                "instance not reachable yet"
            );
            if !self.tick(&mut shutdown).await {
                return Ok(());
            }
        };

        // DNS failure is logged but does not hold up the transition;
        // the record stays on the placeholder until an operator looks.
        if let Err(error) = self.records.set_record(&address).await {
            error!(%error, %address, "server record update failed, record is stale");
        }
        self.notifier.publish(EventKind::Ready).await;
        info!(
            state = %WorkloadState::Running,
            %address,
            grace_min = self.startup_grace.as_secs() / 60,
            "workload running, idle watch begins after grace period"
        );

        // Running / Idle: the level-triggered idle timer.
        let mut tracker = IdleTracker::start(Instant::now(), self.startup_grace, self.idle_timeout);
        loop {
            if !self.tick(&mut shutdown).await {
                return Ok(());
            }
            let now = Instant::now();
            if tracker.in_grace(now) {
                debug!("startup grace period active, skipping activity check");
                continue;
            }
            match self.probe.active_sessions().await {
                Ok(0) => {
                    if tracker.expired(now) {
                        break;
                    }
                    debug!(
                        state = %WorkloadState::Idle,
                        remaining_secs = tracker.remaining(now).as_secs(),
                        "no active sessions"
                    );
                }
                Ok(sessions) => {
                    tracker.observe_activity(now);
                    debug!(
                        state = %WorkloadState::Running,
                        sessions,
                        "activity observed, idle deadline extended"
                    );
                }
                // Not counted as activity and not counted as idle time
                // either: the deadline simply does not move.
                Err(error) => warn!(%error, "session probe failed"),
            }
        }

        // Idle → Stopping.
        info!(
            state = %WorkloadState::Stopping,
            idle_min = self.idle_timeout.as_secs() / 60,
            "idle deadline passed, stopping workload"
        );
        self.notifier.publish(EventKind::Stopping).await;
        loop {
            match self
                .retry
                .retry("scale down", || self.orchestrator.set_desired_count(0))
                .await
            {
                Ok(()) => break,
                Err(error) => {
                    // Stuck Idle despite timeout: surfaced, retried
                    // again a poll later, never silent.
                    error!(%error, "scale-down request failed, retrying next poll");
                    if !self.tick(&mut shutdown).await {
                        return Ok(());
                    }
                }
            }
        }
        if let Err(error) = self.records.clear_record().await {
            error!(%error, "failed to park server record, record is stale");
        }

        // Stopping → Stopped: wait for the orchestrator to confirm.
        loop {
            match self.orchestrator.running_instances().await {
                Ok(instances) if instances.is_empty() => break,
                Ok(instances) => {
                    debug!(remaining = instances.len(), "waiting for instances to drain")
                }
                Err(error) => warn!(%error, "instance query failed"),
            }
            if !self.tick(&mut shutdown).await {
                return Ok(());
            }
        }
        info!(state = %WorkloadState::Stopped, "workload stopped, watchdog done");
        Ok(())
    }

    /// One reachable instance address, if the orchestrator reports any.
    async fn discover_address(&self) -> Option<String> {
        let instances = match self.orchestrator.running_instances().await {
            Ok(instances) => instances,
            Err(error) => {
                warn!(%error, "instance query failed");
                return None;
            }
        };
        let address = instances.into_iter().next()?;
        if self.probe.reachable(&address).await {
            Some(address)
        } else {
            debug!(%address, "instance address assigned but not reachable yet");
            None
        }
    }

    /// Sleep one poll interval; false means shutdown was signalled.
    async fn tick(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = sleep(self.poll_interval) => true,
            _ = shutdown.changed() => {
                info!("watchdog shutting down");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drowse_cloud::{MemoryDns, MemoryOrchestrator, MemoryPublisher, ScriptedProbe};

    fn test_config(vars: &[(&str, &str)]) -> Config {
        let mut all = vec![
            ("CLUSTER", "game-cluster"),
            ("SERVICE", "game-service"),
            ("DNSZONE", "Z1"),
            ("SERVERNAME", "mc.example.com"),
            ("SNSTOPIC", "ops"),
        ];
        all.extend_from_slice(vars);
        Config::from_vars(all.iter().map(|(k, v)| (k.to_string(), v.to_string()))).unwrap()
    }

    struct Harness {
        orchestrator: MemoryOrchestrator,
        dns: MemoryDns,
        publisher: MemoryPublisher,
        probe: ScriptedProbe,
        config: Config,
    }

    impl Harness {
        fn new(vars: &[(&str, &str)]) -> Self {
            Self {
                orchestrator: MemoryOrchestrator::new(),
                dns: MemoryDns::new(),
                publisher: MemoryPublisher::new(),
                probe: ScriptedProbe::new(true, 0),
                config: test_config(vars),
            }
        }

        fn watchdog(
            &self,
        ) -> Watchdog<MemoryOrchestrator, MemoryDns, MemoryPublisher, ScriptedProbe> {
            Watchdog::new(
                &self.config,
                self.orchestrator.clone(),
                RecordSync::new(self.dns.clone(), &self.config),
                Notifier::new(
                    self.publisher.clone(),
                    self.config.topic.clone(),
                    self.config.server_name.clone(),
                ),
                self.probe.clone(),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_the_wait_for_scale_up() {
        let harness = Harness::new(&[]);
        let watchdog = harness.watchdog();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { watchdog.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
        assert!(harness.publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn starting_retries_until_address_is_reachable() {
        let harness = Harness::new(&[("STARTUPMIN", "0"), ("SHUTDOWNMIN", "1"), ("POLLSEC", "10")]);
        harness.orchestrator.set_desired_count(1).await.unwrap();
        harness.probe.set_reachable(false);

        let watchdog = harness.watchdog();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { watchdog.run(shutdown_rx).await });

        // No instance yet, then an unreachable one, then reachable.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(harness.dns.record("Z1", "mc.example.com").is_none());
        harness.orchestrator.set_running(&["10.0.0.7"]);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(harness.dns.record("Z1", "mc.example.com").is_none());
        harness.probe.set_reachable(true);

        handle.await.unwrap().unwrap();
        // Ran through to shutdown; record ends parked.
        assert_eq!(
            harness.dns.record("Z1", "mc.example.com").as_deref(),
            Some("192.168.1.1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dns_failure_does_not_block_the_lifecycle() {
        let harness = Harness::new(&[("STARTUPMIN", "0"), ("SHUTDOWNMIN", "1"), ("POLLSEC", "10")]);
        harness.orchestrator.set_desired_count(1).await.unwrap();
        harness.orchestrator.set_running(&["10.0.0.7"]);
        harness.dns.fail_next_upserts(100);

        let watchdog = harness.watchdog();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        watchdog.run(shutdown_rx).await.unwrap();

        // The record never made it out, but the workload still stopped.
        assert_eq!(harness.orchestrator.desired(), 0);
        assert!(harness.dns.record("Z1", "mc.example.com").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scale_down_outlives_transient_throttling() {
        let harness = Harness::new(&[("STARTUPMIN", "0"), ("SHUTDOWNMIN", "1"), ("POLLSEC", "10")]);
        harness.orchestrator.set_desired_count(1).await.unwrap();
        harness.orchestrator.set_running(&["10.0.0.7"]);
        // More failures than one bounded retry sequence absorbs; the
        // outer loop must carry it across poll ticks.
        harness.orchestrator.fail_next_sets(7);

        let watchdog = harness.watchdog();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        watchdog.run(shutdown_rx).await.unwrap();

        assert_eq!(harness.orchestrator.desired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_neither_extends_nor_expires() {
        let harness = Harness::new(&[("STARTUPMIN", "0"), ("SHUTDOWNMIN", "2"), ("POLLSEC", "60")]);
        harness.orchestrator.set_desired_count(1).await.unwrap();
        harness.orchestrator.set_running(&["10.0.0.7"]);
        harness.probe.set_failing(true);

        let watchdog = harness.watchdog();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { watchdog.run(shutdown_rx).await });

        // With the probe failing, the deadline still stands from boot;
        // the loop keeps polling rather than shutting down on errors.
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(harness.orchestrator.desired(), 1);

        // Once the probe recovers and reports idle, expiry proceeds.
        harness.probe.set_failing(false);
        handle.await.unwrap().unwrap();
        assert_eq!(harness.orchestrator.desired(), 0);
    }
}
