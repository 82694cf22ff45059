//! # Support Core Configuration
//!
//! Explicit, validated configuration for every component of the orchestration
//! core. Defaults match the production values the system was tuned with;
//! deployments override individual fields through `SUPPORT__`-prefixed
//! environment variables (e.g. `SUPPORT__INTAKE__DEDUP_WINDOW_SECONDS=10`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SupportError};

/// Root configuration for the orchestration core
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SupportConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub mass_event: MassEventConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
}

impl SupportConfig {
    /// Load configuration from the environment on top of compiled defaults.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SUPPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SupportError::ConfigurationError(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| SupportError::ConfigurationError(e.to_string()))
    }
}

/// Database connection pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 25,
            acquire_timeout_seconds: 10,
        }
    }
}

/// Message intake: deduplication window and per-client rate limiting
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Trailing window within which byte-identical content from the same
    /// client is treated as the same logical submission
    pub dedup_window_seconds: i64,
    /// Maximum USER messages per client per minute
    pub rate_limit_per_minute: i64,
    pub rate_limit_enabled: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            dedup_window_seconds: 5,
            rate_limit_per_minute: 10,
            rate_limit_enabled: true,
        }
    }
}

/// Mass-event (platform outage) detector thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MassEventConfig {
    /// Pairwise similarity at or above which two messages match
    pub similarity_threshold: f64,
    /// Trailing window of USER messages to scan
    pub time_window_minutes: i64,
    /// Matches required to declare a mass event
    pub mass_threshold: usize,
    /// Most-recent cap on the scanned window
    pub scan_limit: i64,
    /// Confidence stamped on an overriding MASS_OUTAGE classification
    pub override_confidence: f64,
}

impl Default for MassEventConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            time_window_minutes: 10,
            mass_threshold: 5,
            scan_limit: 100,
            override_confidence: 0.95,
        }
    }
}

/// Escalation and priority engine thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Below this confidence a classification is low-confidence (rule 1)
    pub confidence_threshold: f64,
    /// Below this confidence escalation is unconditional
    pub hard_floor_confidence: f64,
    /// Trailing window for repeated low-confidence classifications (rule 3)
    pub repeated_failure_window_hours: i64,
    pub repeated_failure_count: i64,
    /// Trailing window for frustrated repeated contact (rule 4)
    pub repeat_contact_window_minutes: i64,
    pub repeat_contact_count: i64,
    /// Trailing window for a prior escalated reply (rule 5)
    pub recent_escalation_window_hours: i64,
    /// Emotion score above which the COMPLAINT reason fires (rule 6)
    pub emotion_score_threshold: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            hard_floor_confidence: 0.70,
            repeated_failure_window_hours: 2,
            repeated_failure_count: 2,
            repeat_contact_window_minutes: 10,
            repeat_contact_count: 3,
            recent_escalation_window_hours: 1,
            emotion_score_threshold: 0.5,
        }
    }
}

/// Dialog lifecycle timing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Inactivity before the farewell is synthesized
    pub farewell_delay_minutes: i64,
    /// Total inactivity before the session is closed
    pub close_timeout_minutes: i64,
    /// Pause before dispatching the farewell, simulating a natural lull
    pub farewell_send_delay_seconds: u64,
    /// Look-back for a just-sent farewell-shaped message (duplicate guard)
    pub farewell_lookback_minutes: i64,
    /// Interval of the inactivity sweep
    pub sweep_interval_seconds: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            farewell_delay_minutes: 2,
            close_timeout_minutes: 3,
            farewell_send_delay_seconds: 0,
            farewell_lookback_minutes: 1,
            sweep_interval_seconds: 60,
        }
    }
}

/// Reminder engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Maximum reminders claimed per sweep
    pub claim_batch_size: i64,
    /// Delivery attempts before a reminder is terminally failed
    pub max_retry_attempts: i32,
    /// Interval of the reminder sweep
    pub sweep_interval_seconds: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            claim_batch_size: 50,
            max_retry_attempts: 3,
            sweep_interval_seconds: 60,
        }
    }
}

/// Idempotent delivery layer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Default webhook endpoint when a session carries none
    pub default_webhook_url: Option<String>,
    /// Per-request transport timeout
    pub request_timeout_seconds: u64,
    /// Retry attempts for retryable transport failures
    pub max_attempts: u32,
    /// Exponential backoff base delay
    pub backoff_base_seconds: u64,
    /// Exponential backoff cap
    pub backoff_max_seconds: u64,
    /// TTL of the already-sent marker
    pub sent_marker_ttl_seconds: u64,
    /// Humanizing per-scenario send delays
    pub delays_enabled: bool,
}

impl DeliveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_webhook_url: None,
            request_timeout_seconds: 30,
            max_attempts: 3,
            backoff_base_seconds: 2,
            backoff_max_seconds: 10,
            sent_marker_ttl_seconds: 3600,
            delays_enabled: true,
        }
    }
}

/// Classification gateway boundary configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Timeout on the gateway call; a timed-out call degrades to fallback
    pub timeout_seconds: u64,
    /// Successful results below this confidence are downgraded to UNKNOWN
    /// before the core sees them
    pub downgrade_threshold: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            downgrade_threshold: 0.30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuned_values() {
        let config = SupportConfig::default();
        assert_eq!(config.intake.dedup_window_seconds, 5);
        assert_eq!(config.mass_event.mass_threshold, 5);
        assert_eq!(config.mass_event.override_confidence, 0.95);
        assert_eq!(config.escalation.confidence_threshold, 0.85);
        assert_eq!(config.dialog.farewell_delay_minutes, 2);
        assert_eq!(config.dialog.close_timeout_minutes, 3);
        assert_eq!(config.reminders.max_retry_attempts, 3);
        assert_eq!(config.delivery.sent_marker_ttl_seconds, 3600);
    }

    #[test]
    fn test_delivery_timeout_conversion() {
        let config = DeliveryConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
