//! drowse-cloud: the boundary between the control loop and the cloud.
//!
//! Everything the launcher and watchdog need from the outside world is
//! modeled as four narrow capabilities:
//!
//! ```text
//! Orchestrator   desired_count / set_desired_count / running_instances
//! DnsApi         upsert_record(zone, name, address, ttl)
//! Publisher      publish(topic, message)
//! WorkloadProbe  reachable(address) / active_sessions()
//! ```
//!
//! Two families of implementations ship with the crate:
//!
//! - exec backends ([`ExecOrchestrator`], [`ExecDns`], [`ExecPublisher`])
//!   run operator-configured command templates, typically thin wrappers
//!   around the cloud provider's CLI;
//! - in-memory backends ([`MemoryOrchestrator`], [`MemoryDns`],
//!   [`MemoryPublisher`], [`ScriptedProbe`]) back the `--local` smoke
//!   mode and the test suites.
//!
//! [`RecordSync`] and [`Notifier`] sit on top of `DnsApi` and
//! `Publisher` and carry the record/placeholder and fire-and-forget
//! semantics the watchdog relies on.

pub mod api;
pub mod error;
pub mod exec;
pub mod memory;
pub mod notify;
pub mod probe;
pub mod record;

pub use api::{DnsApi, Orchestrator, Publisher, WorkloadProbe};
pub use error::CloudError;
pub use exec::{BackendFile, ExecDns, ExecOrchestrator, ExecPublisher};
pub use memory::{MemoryDns, MemoryOrchestrator, MemoryPublisher, ScriptedProbe};
pub use notify::Notifier;
pub use probe::PortProbe;
pub use record::RecordSync;
