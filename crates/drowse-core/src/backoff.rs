//! Bounded retry with exponential backoff.
//!
//! Every call the control loop makes against an external API goes
//! through a [`RetryPolicy`]: throttling and transient failures are
//! retried a bounded number of times, then the error is handed back to
//! the caller, which decides whether the failure aborts anything (it
//! usually does not; the next poll tick or feed event retries).

use std::time::Duration;

use tracing::warn;

/// Exponential backoff parameters for a bounded retry sequence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial: Duration,
    /// Upper bound on the delay between attempts.
    pub max: Duration,
    /// Delay multiplier applied after each failed attempt.
    pub multiplier: u32,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or `max_attempts` is exhausted.
    ///
    /// Each failure short of the limit is logged at `warn` with the
    /// operation label and retried after the current backoff delay.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut delay = self.initial;
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= self.max_attempts => {
                    warn!(%what, attempt, %error, "giving up after repeated failures");
                    return Err(error);
                }
                Err(error) => {
                    warn!(
                        %what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * self.multiplier).min(self.max);
                    attempt += 1;
                }
            }
        }
    }
}
