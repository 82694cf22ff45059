//! # External Gateway Boundary
//!
//! Traits for the two collaborators the core consumes but does not own: the
//! AI classification gateway and the template/response renderer. The embedding
//! application implements both; the core only sees the boundary types here.
//!
//! The classification boundary is where raw external data is tamed: timeouts
//! and transport failures become `success = false`, malformed scenario labels
//! parse to UNKNOWN, and a successful result below the downgrade threshold is
//! rewritten to UNKNOWN before the orchestrator ever sees it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::ClassificationConfig;
use crate::constants::Scenario;

/// Raw result from the classification gateway
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub success: bool,
    pub scenario: String,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub model: String,
}

impl ClassificationOutcome {
    pub fn failure(model: impl Into<String>) -> Self {
        Self {
            success: false,
            scenario: "UNKNOWN".to_string(),
            confidence: 0.0,
            reasoning: None,
            model: model.into(),
        }
    }
}

/// Validated classification after boundary checks
#[derive(Debug, Clone)]
pub struct BoundedClassification {
    pub scenario: Scenario,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub model: String,
}

/// The external AI classifier, consumed as an opaque scenario+confidence
/// oracle.
#[async_trait]
pub trait ClassificationGateway: Send + Sync {
    async fn classify(&self, text: &str, client_id: &str) -> ClassificationOutcome;
}

/// Renders finished response text for a scenario and parameter bag. Template
/// storage and personalization live behind this trait.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, scenario: Scenario, params: &HashMap<String, String>) -> Option<String>;
}

/// Boundary wrapper applying timeout and validation around the raw gateway.
pub struct BoundedClassifier {
    gateway: Arc<dyn ClassificationGateway>,
    config: ClassificationConfig,
}

impl BoundedClassifier {
    pub fn new(gateway: Arc<dyn ClassificationGateway>, config: ClassificationConfig) -> Self {
        Self { gateway, config }
    }

    /// Classify with a hard timeout. A timed-out or failed call returns
    /// `None`, which the orchestrator degrades to the escalated fallback
    /// rather than hanging.
    pub async fn classify(&self, text: &str, client_id: &str) -> Option<BoundedClassification> {
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let outcome =
            match tokio::time::timeout(timeout, self.gateway.classify(text, client_id)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        client_id = client_id,
                        timeout_seconds = self.config.timeout_seconds,
                        "Classification gateway timed out"
                    );
                    return None;
                }
            };

        if !outcome.success {
            return None;
        }

        Some(self.validate(outcome, client_id))
    }

    fn validate(
        &self,
        outcome: ClassificationOutcome,
        client_id: &str,
    ) -> BoundedClassification {
        let mut scenario = match outcome.scenario.parse::<Scenario>() {
            Ok(s) => s,
            Err(_) => {
                warn!(
                    client_id = client_id,
                    raw_scenario = %outcome.scenario,
                    "Gateway produced a scenario outside the closed set, defaulting to UNKNOWN"
                );
                Scenario::Unknown
            }
        };

        let confidence = outcome.confidence.clamp(0.0, 1.0);
        if confidence < self.config.downgrade_threshold {
            scenario = Scenario::Unknown;
        }

        BoundedClassification {
            scenario,
            confidence,
            reasoning: outcome.reasoning,
            model: outcome.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGateway(ClassificationOutcome);

    #[async_trait]
    impl ClassificationGateway for FixedGateway {
        async fn classify(&self, _text: &str, _client_id: &str) -> ClassificationOutcome {
            self.0.clone()
        }
    }

    fn classifier(outcome: ClassificationOutcome) -> BoundedClassifier {
        BoundedClassifier::new(Arc::new(FixedGateway(outcome)), ClassificationConfig::default())
    }

    #[tokio::test]
    async fn test_failed_outcome_maps_to_none() {
        let result = classifier(ClassificationOutcome::failure("gpt-4o-mini"))
            .classify("hi", "client-1")
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_scenario_defaults_to_unknown() {
        let result = classifier(ClassificationOutcome {
            success: true,
            scenario: "TOTALLY_NEW_LABEL".to_string(),
            confidence: 0.92,
            reasoning: None,
            model: "gpt-4o-mini".to_string(),
        })
        .classify("hi", "client-1")
        .await
        .unwrap();
        assert_eq!(result.scenario, Scenario::Unknown);
        assert_eq!(result.confidence, 0.92);
    }

    #[tokio::test]
    async fn test_sub_threshold_confidence_downgrades_scenario() {
        let result = classifier(ClassificationOutcome {
            success: true,
            scenario: "GREETING".to_string(),
            confidence: 0.10,
            reasoning: None,
            model: "gpt-4o-mini".to_string(),
        })
        .classify("hi", "client-1")
        .await
        .unwrap();
        assert_eq!(result.scenario, Scenario::Unknown);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let result = classifier(ClassificationOutcome {
            success: true,
            scenario: "GREETING".to_string(),
            confidence: 1.7,
            reasoning: None,
            model: "gpt-4o-mini".to_string(),
        })
        .classify("hi", "client-1")
        .await
        .unwrap();
        assert_eq!(result.confidence, 1.0);
    }
}
