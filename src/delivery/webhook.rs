//! # Webhook Channel Adapter
//!
//! The single wire through which responses leave the system: an HTTP POST of
//! the outbound payload to the session's webhook endpoint. Owns transport
//! failure classification and the bounded retry/backoff loop.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;

/// Outbound payload posted to the channel endpoint
#[derive(Debug, Clone, Serialize)]
pub struct OutboundPayload {
    pub message_id: Uuid,
    pub client_id: String,
    pub text: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Transport failure, split by whether another attempt could succeed
#[derive(Debug, Clone, PartialEq)]
pub enum SendFailure {
    /// Timeout, connection failure, 429 or 5xx gateway statuses
    Retryable(String),
    /// Any other non-2xx response; retrying would repeat the same rejection
    Fatal(String),
}

impl SendFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendFailure::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            SendFailure::Retryable(msg) | SendFailure::Fatal(msg) => msg,
        }
    }
}

pub struct WebhookSender {
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl WebhookSender {
    pub fn new(config: DeliveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Post the payload, retrying retryable failures with exponential backoff
    /// up to the configured attempt budget. Returns the channel's external
    /// message id when it reports one.
    pub async fn send(
        &self,
        url: &str,
        payload: &OutboundPayload,
    ) -> Result<Option<String>, SendFailure> {
        let mut last_failure = SendFailure::Retryable("no attempts made".to_string());

        for attempt in 1..=self.config.max_attempts {
            match self.attempt(url, payload).await {
                Ok(external_id) => {
                    debug!(
                        message_id = %payload.message_id,
                        attempt = attempt,
                        "Webhook delivery succeeded"
                    );
                    return Ok(external_id);
                }
                Err(failure) => {
                    warn!(
                        message_id = %payload.message_id,
                        attempt = attempt,
                        retryable = failure.is_retryable(),
                        error = failure.message(),
                        "Webhook delivery attempt failed"
                    );
                    let retryable = failure.is_retryable();
                    last_failure = failure;
                    if !retryable {
                        break;
                    }
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_failure)
    }

    async fn attempt(
        &self,
        url: &str,
        payload: &OutboundPayload,
    ) -> Result<Option<String>, SendFailure> {
        let response = match self.client.post(url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => return Err(classify_transport_error(&e)),
        };

        let status = response.status();
        if status.is_success() {
            let external_id = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("external_id")
                        .or_else(|| body.get("message_id"))
                        .and_then(|v| v.as_str().map(str::to_string))
                });
            return Ok(external_id);
        }

        let message = format!("webhook returned {status}");
        if is_retryable_status(status.as_u16()) {
            Err(SendFailure::Retryable(message))
        } else {
            Err(SendFailure::Fatal(message))
        }
    }

    /// Exponential backoff before the next attempt, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.backoff_base_seconds.saturating_mul(
            2u64.saturating_pow(attempt.saturating_sub(1)),
        );
        Duration::from_secs(exp.min(self.config.backoff_max_seconds))
    }
}

/// Gateway statuses worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

fn classify_transport_error(e: &reqwest::Error) -> SendFailure {
    if e.is_timeout() || e.is_connect() {
        SendFailure::Retryable(e.to_string())
    } else {
        SendFailure::Fatal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_classification() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(502));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(504));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(500));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let sender = WebhookSender::new(DeliveryConfig::default());
        assert_eq!(sender.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(sender.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(sender.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(sender.backoff_delay(4), Duration::from_secs(10));
        assert_eq!(sender.backoff_delay(10), Duration::from_secs(10));
    }

    #[test]
    fn test_send_failure_accessors() {
        let failure = SendFailure::Retryable("timed out".to_string());
        assert!(failure.is_retryable());
        assert_eq!(failure.message(), "timed out");
        assert!(!SendFailure::Fatal("bad request".to_string()).is_retryable());
    }
}
