//! Mailer adapters.

use crate::telemetry::{NOTIFICATIONS_DELIVERED, NOTIFICATIONS_FAILED};
use helpdesk_engine::ports::PortFuture;
use helpdesk_engine::{DeliveryError, Mailer, NotificationEvent};
use std::sync::Arc;

/// Writes every notification to the log as JSON instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> PortFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            let body = serde_json::to_string(&event.payload).map_err(|e| DeliveryError {
                recipient: event.recipient.clone(),
                reason: format!("payload not serializable: {e}"),
            })?;
            tracing::info!(
                kind = ?event.kind,
                recipient = %event.recipient,
                payload = %body,
                "notification"
            );
            Ok(())
        })
    }
}

/// Counts deliveries and failures on the wrapped mailer.
#[derive(Clone)]
pub struct MeteredMailer {
    inner: Arc<dyn Mailer>,
}

impl MeteredMailer {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Mailer>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for MeteredMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredMailer").finish_non_exhaustive()
    }
}

impl Mailer for MeteredMailer {
    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> PortFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            let result = self.inner.deliver(event).await;
            match &result {
                Ok(()) => metrics::counter!(NOTIFICATIONS_DELIVERED).increment(1),
                Err(_) => metrics::counter!(NOTIFICATIONS_FAILED).increment(1),
            }
            result
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use helpdesk_engine::notification::dispatch_created;
    use helpdesk_engine::{Ticket, TicketCategory, TicketId, TicketPriority, TicketStatus, UserId};

    #[tokio::test]
    async fn tracing_mailer_accepts_every_event() {
        let ticket = Ticket {
            id: TicketId::new(),
            title: "Shared drive missing".to_string(),
            description: "Mapped drive Z: is gone".to_string(),
            status: TicketStatus::New,
            priority: TicketPriority::Medium,
            category: TicketCategory::Network,
            created_at: helpdesk_testing::t0(),
            last_updated_at: None,
            resolved_at: None,
            estimated_resolution_minutes: None,
            actual_resolution_minutes: None,
            requester_id: UserId::new("alice"),
            assigned_to_id: None,
            version: 1,
        };

        let mailer = MeteredMailer::new(Arc::new(TracingMailer));
        for event in dispatch_created(&ticket, "support-team") {
            mailer.deliver(&event).await.unwrap();
        }
    }
}
