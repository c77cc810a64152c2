//! In-memory capability backends.
//!
//! Shared-state fakes used by the `--local` smoke mode and the test
//! suites. Each backend can be told to fail its next N mutating calls to
//! exercise the retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{DnsApi, Orchestrator, Publisher, WorkloadProbe};
use crate::error::CloudError;

#[derive(Debug, Default)]
struct OrchestratorInner {
    desired: u32,
    running: Vec<String>,
    set_calls: Vec<u32>,
    fail_sets: u32,
}

/// In-memory orchestration API.
///
/// `set_desired_count(0)` drains the running instances immediately, as
/// if the orchestrator stopped the task the moment it was asked to.
/// Scale-up does not populate instances by itself; tests and the local
/// mode place an instance with [`set_running`](Self::set_running) to
/// model boot latency.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrchestrator {
    inner: Arc<Mutex<OrchestratorInner>>,
}

impl MemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_desired(desired: u32) -> Self {
        let this = Self::default();
        this.inner.lock().unwrap().desired = desired;
        this
    }

    /// Place running instances, as the orchestration API would after
    /// the workload boots.
    pub fn set_running(&self, addresses: &[&str]) {
        self.inner.lock().unwrap().running =
            addresses.iter().map(|s| s.to_string()).collect();
    }

    /// Fail the next `n` calls to `set_desired_count`.
    pub fn fail_next_sets(&self, n: u32) {
        self.inner.lock().unwrap().fail_sets = n;
    }

    pub fn desired(&self) -> u32 {
        self.inner.lock().unwrap().desired
    }

    /// Every value passed to `set_desired_count`, in call order.
    pub fn set_call_log(&self) -> Vec<u32> {
        self.inner.lock().unwrap().set_calls.clone()
    }
}

impl Orchestrator for MemoryOrchestrator {
    async fn desired_count(&self) -> Result<u32, CloudError> {
        Ok(self.inner.lock().unwrap().desired)
    }

    async fn set_desired_count(&self, count: u32) -> Result<(), CloudError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sets > 0 {
            inner.fail_sets -= 1;
            return Err(CloudError::Unavailable("orchestrator throttled".into()));
        }
        inner.set_calls.push(count);
        inner.desired = count;
        if count == 0 {
            inner.running.clear();
        }
        Ok(())
    }

    async fn running_instances(&self) -> Result<Vec<String>, CloudError> {
        Ok(self.inner.lock().unwrap().running.clone())
    }
}

#[derive(Debug, Default)]
struct DnsInner {
    records: HashMap<(String, String), (String, u32)>,
    fail_upserts: u32,
}

/// In-memory DNS API.
#[derive(Debug, Clone, Default)]
pub struct MemoryDns {
    inner: Arc<Mutex<DnsInner>>,
}

impl MemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` upserts.
    pub fn fail_next_upserts(&self, n: u32) {
        self.inner.lock().unwrap().fail_upserts = n;
    }

    /// Current record value for a zone/name pair.
    pub fn record(&self, zone: &str, name: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .records
            .get(&(zone.to_string(), name.to_string()))
            .map(|(address, _)| address.clone())
    }

    pub fn record_ttl(&self, zone: &str, name: &str) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .records
            .get(&(zone.to_string(), name.to_string()))
            .map(|(_, ttl)| *ttl)
    }
}

impl DnsApi for MemoryDns {
    async fn upsert_record(
        &self,
        zone: &str,
        name: &str,
        address: &str,
        ttl_secs: u32,
    ) -> Result<(), CloudError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_upserts > 0 {
            inner.fail_upserts -= 1;
            return Err(CloudError::Unavailable("dns throttled".into()));
        }
        inner.records.insert(
            (zone.to_string(), name.to_string()),
            (address.to_string(), ttl_secs),
        );
        Ok(())
    }
}

/// In-memory pub/sub topic.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All `(topic, message)` pairs published so far.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), CloudError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CloudError::Unavailable("topic unavailable".into()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), message.to_string()));
        Ok(())
    }
}

/// Scriptable workload probe.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    reachable: Arc<AtomicBool>,
    sessions: Arc<AtomicU32>,
    failing: Arc<AtomicBool>,
}

impl ScriptedProbe {
    pub fn new(reachable: bool, sessions: u32) -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(reachable)),
            sessions: Arc::new(AtomicU32::new(sessions)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_sessions(&self, sessions: u32) {
        self.sessions.store(sessions, Ordering::SeqCst);
    }

    /// Make `active_sessions` fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl WorkloadProbe for ScriptedProbe {
    async fn reachable(&self, _address: &str) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn active_sessions(&self) -> Result<u32, CloudError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CloudError::Unavailable("probe failed".into()));
        }
        Ok(self.sessions.load(Ordering::SeqCst))
    }
}
