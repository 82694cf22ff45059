//! # Operator Notification Registry
//!
//! Fan-out of orchestration events to connected operator sessions over a
//! broadcast channel. The registry is an injected, explicitly-owned object
//! with its lifecycle tied to process start/stop; the embedding web layer
//! subscribes one receiver per live operator connection.
//!
//! Fan-out is best-effort. No subscribers, lagging subscribers, or a closed
//! channel never fail the operation that produced the event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::constants::{EscalationReason, PriorityLevel};

/// Event pushed to every connected operator session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorNotification {
    /// One of the `constants::events` names
    pub event: String,
    pub client_id: String,
    pub message_id: Uuid,
    /// Truncated message content for the operator list view
    pub preview: String,
    pub requires_escalation: bool,
    pub priority: PriorityLevel,
    pub escalation_reason: Option<EscalationReason>,
    pub priority_queue: i32,
}

impl OperatorNotification {
    pub fn new(event: &str, client_id: &str, message_id: Uuid, content: &str) -> Self {
        Self {
            event: event.to_string(),
            client_id: client_id.to_string(),
            message_id,
            preview: preview_of(content),
            requires_escalation: false,
            priority: PriorityLevel::Low,
            escalation_reason: None,
            priority_queue: PriorityLevel::Low.priority_queue(),
        }
    }

    pub fn with_escalation(
        mut self,
        priority: PriorityLevel,
        escalation_reason: Option<EscalationReason>,
    ) -> Self {
        self.requires_escalation = true;
        self.priority = priority;
        self.escalation_reason = escalation_reason;
        self.priority_queue = priority.priority_queue();
        self
    }
}

const PREVIEW_CHARS: usize = 120;

fn preview_of(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}…")
    }
}

pub struct OperatorRegistry {
    sender: broadcast::Sender<OperatorNotification>,
}

impl OperatorRegistry {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// One receiver per connected operator session.
    pub fn subscribe(&self) -> broadcast::Receiver<OperatorNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast to every subscriber; returns how many received it.
    pub fn notify(&self, notification: OperatorNotification) -> usize {
        match self.sender.send(notification) {
            Ok(received) => received,
            Err(_) => {
                debug!("No operator sessions connected, notification dropped");
                0
            }
        }
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::events;

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let registry = OperatorRegistry::new(8);
        let mut rx = registry.subscribe();

        let sent = registry.notify(OperatorNotification::new(
            events::MESSAGE_ESCALATED,
            "client-1",
            Uuid::new_v4(),
            "my lessons are broken",
        ));
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, events::MESSAGE_ESCALATED);
        assert_eq!(received.client_id, "client-1");
        assert_eq!(received.preview, "my lessons are broken");
    }

    #[test]
    fn test_notify_without_subscribers_is_a_noop() {
        let registry = OperatorRegistry::new(8);
        let sent = registry.notify(OperatorNotification::new(
            events::MESSAGE_RECEIVED,
            "client-1",
            Uuid::new_v4(),
            "hi",
        ));
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_escalation_fields_follow_priority() {
        let n = OperatorNotification::new(events::MESSAGE_ESCALATED, "c1", Uuid::new_v4(), "x")
            .with_escalation(PriorityLevel::Critical, Some(EscalationReason::Complaint));
        assert!(n.requires_escalation);
        assert_eq!(n.priority_queue, 1);
    }

    #[test]
    fn test_long_previews_are_truncated() {
        let long = "a".repeat(500);
        let n = OperatorNotification::new(events::MESSAGE_RECEIVED, "c1", Uuid::new_v4(), &long);
        assert_eq!(n.preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(n.preview.ends_with('…'));
    }
}
