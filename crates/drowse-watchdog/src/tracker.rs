//! Idle deadline tracking.
//!
//! A level-triggered timer that resets on every observed edge: the
//! deadline extends whenever activity is seen, and expiry is only
//! meaningful once the startup grace period has elapsed. Pure state
//! over [`tokio::time::Instant`] so the watchdog loop and the tests
//! share the same (pausable) clock.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the grace window and the rolling idle deadline.
#[derive(Debug, Clone)]
pub struct IdleTracker {
    grace_end: Instant,
    deadline: Instant,
    idle_timeout: Duration,
}

impl IdleTracker {
    /// Start tracking at `now`, typically the Starting→Running instant.
    ///
    /// The idle deadline begins at `grace_end + idle_timeout`: a server
    /// that never sees a single connection is shut down one idle-timeout
    /// after its grace period ends, not one idle-timeout after boot.
    pub fn start(now: Instant, grace: Duration, idle_timeout: Duration) -> Self {
        let grace_end = now + grace;
        Self {
            grace_end,
            deadline: grace_end + idle_timeout,
            idle_timeout,
        }
    }

    /// Whether `now` is still inside the startup grace window.
    /// Activity is never evaluated during grace.
    pub fn in_grace(&self, now: Instant) -> bool {
        now < self.grace_end
    }

    /// Record observed activity, extending the deadline to
    /// `now + idle_timeout`. The deadline never moves backwards.
    pub fn observe_activity(&mut self, now: Instant) {
        let candidate = now + self.idle_timeout;
        if candidate > self.deadline {
            self.deadline = candidate;
        }
    }

    /// Whether the idle deadline has passed. Always false during grace.
    pub fn expired(&self, now: Instant) -> bool {
        !self.in_grace(now) && now >= self.deadline
    }

    /// Time left until the deadline, for logging.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}
