//! Best-effort NATS publication of domain events.

use std::fmt;

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    /// Publisher that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Connects when a URL is configured. A failed connection degrades to a disabled publisher.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.nats.is_some()
    }

    /// Publication failures are logged, never returned: the store write already committed.
    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, subject = event.subject(), "failed to encode event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "failed to publish event");
        }
    }
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher").field("enabled", &self.is_enabled()).finish()
    }
}
