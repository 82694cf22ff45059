//! # Delivery Service
//!
//! The uniform `Send` contract over the webhook adapter: consult the
//! idempotency marker, wait out the scenario's humanizing delay, dispatch
//! with retries, record the marker on success. Also owns the best-effort
//! operator fan-out.
//!
//! Delivery failure never invalidates the committed message record; callers
//! receive a receipt and decide their own follow-up (the reminder worker
//! turns it into `RecordFailure`, the orchestrator only logs it).

use rand::Rng;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::constants::Scenario;
use crate::delivery::idempotency::SentMarkerCache;
use crate::delivery::notifier::{OperatorNotification, OperatorRegistry};
use crate::delivery::webhook::{OutboundPayload, WebhookSender};
use crate::models::{Message, SessionChannel};

/// Outcome of one `send` call
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub success: bool,
    /// The marker was already present; nothing was sent
    pub skipped: bool,
    pub external_id: Option<String>,
    pub error: Option<String>,
    /// Meaningful only on failure
    pub retryable: bool,
}

impl DeliveryReceipt {
    fn skipped(external_id: Option<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            external_id,
            error: None,
            retryable: false,
        }
    }

    fn sent(external_id: Option<String>) -> Self {
        Self {
            success: true,
            skipped: false,
            external_id,
            error: None,
            retryable: false,
        }
    }

    fn failed(error: String, retryable: bool) -> Self {
        Self {
            success: false,
            skipped: false,
            external_id: None,
            error: Some(error),
            retryable,
        }
    }
}

pub struct DeliveryService {
    sender: WebhookSender,
    markers: SentMarkerCache,
    operators: OperatorRegistry,
    config: DeliveryConfig,
}

impl DeliveryService {
    pub fn new(config: DeliveryConfig, operators: OperatorRegistry) -> Self {
        let markers = SentMarkerCache::new(Duration::from_secs(config.sent_marker_ttl_seconds));
        let sender = WebhookSender::new(config.clone());
        Self {
            sender,
            markers,
            operators,
            config,
        }
    }

    /// Deliver one message to the client's channel, exactly-once-observed by
    /// `message.id`.
    #[instrument(skip(self, message, channel), fields(message_id = %message.id, client_id = %message.client_id))]
    pub async fn send(
        &self,
        message: &Message,
        channel: &SessionChannel,
        scenario: Option<Scenario>,
    ) -> DeliveryReceipt {
        if let Some(external_id) = self.markers.lookup(message.id) {
            return DeliveryReceipt::skipped(external_id);
        }

        if self.config.delays_enabled {
            if let Some(scenario) = scenario {
                tokio::time::sleep(sample_scenario_delay(scenario)).await;
            }
        }

        let url = match channel
            .webhook_url
            .as_deref()
            .or(self.config.default_webhook_url.as_deref())
        {
            Some(url) => url.to_string(),
            None => {
                warn!("No webhook endpoint for client, delivery dropped");
                return DeliveryReceipt::failed("no webhook endpoint configured".to_string(), false);
            }
        };

        let payload = OutboundPayload {
            message_id: message.id,
            client_id: message.client_id.clone(),
            text: message.content.clone(),
            message_type: message.message_type.clone(),
            platform: channel.platform.clone(),
            chat_id: channel.chat_id.clone(),
        };

        match self.sender.send(&url, &payload).await {
            Ok(external_id) => {
                self.markers.record(message.id, external_id.clone());
                DeliveryReceipt::sent(external_id)
            }
            Err(failure) => {
                DeliveryReceipt::failed(failure.message().to_string(), failure.is_retryable())
            }
        }
    }

    /// Best-effort fan-out to connected operator sessions.
    pub fn notify_operators(&self, notification: OperatorNotification) {
        self.operators.notify(notification);
    }

    pub fn subscribe_operators(
        &self,
    ) -> tokio::sync::broadcast::Receiver<OperatorNotification> {
        self.operators.subscribe()
    }

    /// Direct marker write, used when an external sender already confirmed a
    /// delivery this process did not perform.
    pub fn record_sent(&self, message_id: Uuid, external_id: Option<String>) {
        self.markers.record(message_id, external_id);
    }
}

/// Humanizing pause before dispatching a scenario response.
pub fn scenario_delay_bounds(scenario: Scenario) -> (Duration, Duration) {
    match scenario {
        Scenario::Greeting | Scenario::GreetingTimeRequest => {
            (Duration::from_secs(2), Duration::from_secs(5))
        }
        Scenario::TechSupportBasic => (Duration::from_secs(5), Duration::from_secs(5)),
        Scenario::AbsenceRequest => (Duration::from_secs(10), Duration::from_secs(10)),
        _ => (Duration::from_millis(300), Duration::from_secs(1)),
    }
}

fn sample_scenario_delay(scenario: Scenario) -> Duration {
    let (min, max) = scenario_delay_bounds(scenario);
    if min >= max {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_delay_table() {
        let (min, max) = scenario_delay_bounds(Scenario::Greeting);
        assert_eq!(min, Duration::from_secs(2));
        assert_eq!(max, Duration::from_secs(5));

        let (min, max) = scenario_delay_bounds(Scenario::TechSupportBasic);
        assert_eq!(min, max);
        assert_eq!(min, Duration::from_secs(5));

        let (_, max) = scenario_delay_bounds(Scenario::Complaint);
        assert!(max <= Duration::from_secs(1));
    }

    #[test]
    fn test_sampled_delay_stays_in_bounds() {
        for _ in 0..50 {
            let d = sample_scenario_delay(Scenario::Greeting);
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn test_second_send_with_same_id_is_skipped() {
        let service = DeliveryService::new(DeliveryConfig::default(), OperatorRegistry::default());
        let id = Uuid::new_v4();
        service.record_sent(id, Some("ext-42".to_string()));

        let message = Message {
            id,
            client_id: "client-1".to_string(),
            content: "hello".to_string(),
            message_type: "bot_auto".to_string(),
            priority: "low".to_string(),
            escalation_reason: None,
            is_first_message: false,
            is_processed: true,
            created_at: chrono::Utc::now(),
        };

        let receipt = service.send(&message, &SessionChannel::default(), None).await;
        assert!(receipt.success);
        assert!(receipt.skipped);
        assert_eq!(receipt.external_id, Some("ext-42".to_string()));
    }

    #[tokio::test]
    async fn test_missing_endpoint_fails_non_retryable() {
        let config = DeliveryConfig {
            delays_enabled: false,
            ..DeliveryConfig::default()
        };
        let service = DeliveryService::new(config, OperatorRegistry::default());

        let message = Message {
            id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            content: "hello".to_string(),
            message_type: "bot_auto".to_string(),
            priority: "low".to_string(),
            escalation_reason: None,
            is_first_message: false,
            is_processed: true,
            created_at: chrono::Utc::now(),
        };

        let receipt = service.send(&message, &SessionChannel::default(), None).await;
        assert!(!receipt.success);
        assert!(!receipt.retryable);
        assert!(!receipt.skipped);
    }
}
