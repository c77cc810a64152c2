//! Operator notifications.
//!
//! Fire-and-forget publishing of [`ServerEvent`]s. A missing topic
//! disables publishing entirely; a publish failure is logged and
//! swallowed so it can never block or fail a watchdog transition.

use drowse_core::{EventKind, ServerEvent};
use tracing::{debug, info, warn};

use crate::api::Publisher;

/// Thin publish boundary to the operator topic.
#[derive(Debug)]
pub struct Notifier<P> {
    publisher: P,
    topic: Option<String>,
    hostname: String,
}

impl<P: Publisher> Notifier<P> {
    pub fn new(publisher: P, topic: Option<String>, hostname: impl Into<String>) -> Self {
        Self {
            publisher,
            topic,
            hostname: hostname.into(),
        }
    }

    /// Publish a lifecycle event. Infallible by design.
    pub async fn publish(&self, kind: EventKind) {
        let Some(topic) = &self.topic else {
            debug!(?kind, "notifications disabled, skipping");
            return;
        };

        let event = ServerEvent::now(kind, &self.hostname);
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "failed to encode notification");
                return;
            }
        };

        match self.publisher.publish(topic, &body).await {
            Ok(()) => info!(?kind, %topic, "notification published"),
            Err(error) => warn!(?kind, %topic, %error, "notification publish failed"),
        }
    }
}
