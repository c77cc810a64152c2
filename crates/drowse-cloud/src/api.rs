//! Capability traits consumed by the launcher and watchdog.
//!
//! All four traits are generic seams: components take an implementation
//! by value and stay monomorphic over it. The orchestration API is the
//! single shared mutable resource between launcher and watchdog; both
//! treat `set_desired_count` as an idempotent, order-insensitive request
//! and accept the API itself as the final arbiter.

use crate::error::CloudError;

/// A single scalable compute unit with a desired replica count of 0 or 1.
pub trait Orchestrator: Send + Sync {
    /// Current desired replica count as reported by the orchestration API.
    fn desired_count(&self) -> impl Future<Output = Result<u32, CloudError>> + Send;

    /// Request a desired replica count. Setting the current value again
    /// is a no-op, never an error.
    fn set_desired_count(&self, count: u32) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// Addresses of the currently running instances. Empty while the
    /// workload is stopped or still being placed.
    fn running_instances(&self) -> impl Future<Output = Result<Vec<String>, CloudError>> + Send;
}

/// Record upsert against a hosted zone.
pub trait DnsApi: Send + Sync {
    fn upsert_record(
        &self,
        zone: &str,
        name: &str,
        address: &str,
        ttl_secs: u32,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;
}

/// Message publish to an operator-facing topic.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;
}

/// Liveness and activity observation against the workload itself.
///
/// The exact meaning of an active session is deliberately pluggable;
/// the shipped [`crate::PortProbe`] counts established TCP connections
/// on the service port, but a protocol-aware player-count query fits
/// behind the same seam.
pub trait WorkloadProbe: Send + Sync {
    /// Basic reachability check against a candidate instance address.
    fn reachable(&self, address: &str) -> impl Future<Output = bool> + Send;

    /// Number of active sessions observed at this instant.
    fn active_sessions(&self) -> impl Future<Output = Result<u32, CloudError>> + Send;
}
