//! Shared types used across the drowse crates.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the managed workload, as derived by the watchdog.
///
/// The launcher never sees this enum; it only requests the external
/// Stopped to Starting transition by setting the desired count to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadState {
    /// No instance running, desired count 0.
    Stopped,
    /// Desired count is 1, waiting for a reachable instance.
    Starting,
    /// Instance reachable, inside the startup grace period or with
    /// recent activity.
    Running,
    /// Instance reachable, no active sessions, idle deadline pending.
    Idle,
    /// Shutdown requested, waiting for instances to drain.
    Stopping,
}

impl std::fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkloadState::Stopped => "stopped",
            WorkloadState::Starting => "starting",
            WorkloadState::Running => "running",
            WorkloadState::Idle => "idle",
            WorkloadState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// One observed resolution attempt for the managed hostname.
///
/// Produced by the query-log feed, consumed once by the launcher, never
/// persisted. Delivery is at-least-once and unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub observed_at: SystemTime,
    pub hostname: String,
}

impl ActivityEvent {
    pub fn now(hostname: impl Into<String>) -> Self {
        Self {
            observed_at: SystemTime::now(),
            hostname: hostname.into(),
        }
    }
}

/// Kind of operator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Scale-up observed, waiting for the instance to come up.
    Starting,
    /// Instance reachable and published in DNS.
    Ready,
    /// Idle timeout reached, shutdown requested.
    Stopping,
}

/// Structured message published to the operator topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub kind: EventKind,
    pub hostname: String,
    /// Unix epoch seconds.
    pub timestamp: u64,
}

impl ServerEvent {
    pub fn now(kind: EventKind, hostname: impl Into<String>) -> Self {
        Self {
            kind,
            hostname: hostname.into(),
            timestamp: epoch_secs(),
        }
    }
}

/// Current time as unix epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_state_display() {
        assert_eq!(WorkloadState::Starting.to_string(), "starting");
        assert_eq!(WorkloadState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn server_event_serializes_kind_lowercase() {
        let event = ServerEvent {
            kind: EventKind::Stopping,
            hostname: "mc.example.com".to_string(),
            timestamp: 1700000000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"stopping""#));
        assert!(json.contains(r#""hostname":"mc.example.com""#));

        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
