//! drowse-watchdog: the idle-shutdown control loop.
//!
//! Runs co-located with the workload, one instance at a time, as a
//! single sequential poll loop. No locks, no internal concurrency, no
//! persisted state: on restart a fresh watchdog re-derives everything
//! from observed reachability.
//!
//! ```text
//! Stopped ──desired=1──▶ Starting ──reachable──▶ Running
//!                            │                     │ grace, then poll
//!                            │ retries forever     ▼
//!                            │                   Idle ◀──activity──┐
//!                            │                     │ deadline past │
//!                            ▼                     ▼               │
//!                        (logged)              Stopping ───────────┘
//!                                                  │ instances drained
//!                                                  ▼
//!                                               Stopped
//! ```
//!
//! On Starting→Running the watchdog writes the instance address into
//! DNS and publishes `ready`; on Idle→Stopping it publishes `stopping`,
//! requests desired count 0, and parks the record on the placeholder.

pub mod tracker;
pub mod watchdog;

pub use tracker::IdleTracker;
pub use watchdog::Watchdog;
