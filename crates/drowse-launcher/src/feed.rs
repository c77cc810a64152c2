//! Resolver query-log activity feed.
//!
//! Reads query-log lines from any buffered async reader (stdin in the
//! shipped binary, a tailed file elsewhere) and emits an
//! [`ActivityEvent`] for every line mentioning the managed hostname.
//! The match is a case-insensitive any-term containment check, the same
//! filter the log subscription applies upstream, so the feed tolerates
//! whatever framing the resolver writes around the name.

use drowse_core::ActivityEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Filters raw query-log lines down to activity events.
#[derive(Debug, Clone)]
pub struct QueryLogFeed {
    hostname: String,
}

impl QueryLogFeed {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_ascii_lowercase(),
        }
    }

    /// Match a single log line, producing an event if it mentions the
    /// managed hostname.
    pub fn match_line(&self, line: &str) -> Option<ActivityEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.to_ascii_lowercase().contains(&self.hostname) {
            Some(ActivityEvent::now(&self.hostname))
        } else {
            None
        }
    }

    /// Pump lines from `reader` into `events` until EOF or until the
    /// receiver side goes away.
    pub async fn run<R>(&self, reader: R, events: mpsc::Sender<ActivityEvent>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let Some(event) = self.match_line(&line) else {
                continue;
            };
            debug!(hostname = %event.hostname, "resolution attempt observed");
            if events.send(event).await.is_err() {
                break;
            }
        }
        info!("query log feed closed");
        Ok(())
    }
}
