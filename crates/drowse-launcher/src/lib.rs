//! drowse-launcher: first-contact detection and scale-up.
//!
//! When a client tries to connect to a stopped server, the only
//! observable signal is the DNS resolution attempt against the server's
//! subdomain. The resolver query log is the activity feed; the launcher
//! consumes it and idempotently raises the desired count from 0 to 1.
//!
//! ```text
//! query log line ──▶ QueryLogFeed ──▶ ActivityEvent ──▶ Launcher
//!                                                        │ desired == 0?
//!                                                        ▼
//!                                              set_desired_count(1)
//! ```
//!
//! Delivery is at-least-once and unordered; duplicate or concurrent
//! events are absorbed by the idempotent desired-count request.

pub mod feed;
pub mod launcher;

pub use feed::QueryLogFeed;
pub use launcher::Launcher;
