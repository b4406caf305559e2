//! Boundary to the external email/notification collaborator.
//!
//! Deliveries are fire-and-forget: they run on a detached task, failures are
//! logged, and nothing here can roll back or fail a committed reservation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use reservation::model::Reservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Cancelled,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Created => "created",
            Action::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Snapshot handed to the delivery system.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub owner_display_name: String,
    pub action: Action,
    pub reservation: Reservation,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Default sink for deployments without a delivery backend: logs the payload.
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&notification)?;
        tracing::info!(action = %notification.action, payload, "reservation notification");
        Ok(())
    }
}

/// Spawn the delivery and move on. Identity enrichment (real display names)
/// happens at the boundary that owns user records; the engine passes the
/// owner id through.
pub(crate) fn deliver_best_effort(
    sink: Arc<dyn NotificationSink>,
    reservation: Reservation,
    action: Action,
) {
    let notification = Notification {
        owner_display_name: reservation.owner.to_string(),
        action,
        reservation,
    };
    tokio::spawn(async move {
        if let Err(e) = sink.deliver(notification).await {
            tracing::warn!(error = %e, "notification delivery failed; reservation state unaffected");
        }
    });
}
