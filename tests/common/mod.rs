//! Shared fixtures for the integration tests: canned classification
//! gateways, template renderers and a fully wired orchestrator with
//! humanizing delays disabled.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use support_core::config::{DeliveryConfig, SupportConfig};
use support_core::delivery::{DeliveryService, OperatorRegistry};
use support_core::gateway::{ClassificationGateway, ClassificationOutcome, TemplateRenderer};
use support_core::models::SessionChannel;
use support_core::orchestration::MessageOrchestrator;
use support_core::Scenario;

/// Gateway returning the same outcome for every call.
pub struct StubGateway(pub ClassificationOutcome);

#[async_trait]
impl ClassificationGateway for StubGateway {
    async fn classify(&self, _text: &str, _client_id: &str) -> ClassificationOutcome {
        self.0.clone()
    }
}

pub fn gateway(scenario: &str, confidence: f64) -> Arc<dyn ClassificationGateway> {
    Arc::new(StubGateway(ClassificationOutcome {
        success: true,
        scenario: scenario.to_string(),
        confidence,
        reasoning: Some("stubbed".to_string()),
        model: "stub-model".to_string(),
    }))
}

pub fn failing_gateway() -> Arc<dyn ClassificationGateway> {
    Arc::new(StubGateway(ClassificationOutcome::failure("stub-model")))
}

/// Renderer with no templates at all; everything falls back to compiled text.
pub struct NoTemplates;

#[async_trait]
impl TemplateRenderer for NoTemplates {
    async fn render(
        &self,
        _scenario: Scenario,
        _params: &HashMap<String, String>,
    ) -> Option<String> {
        None
    }
}

pub fn renderer() -> Arc<dyn TemplateRenderer> {
    Arc::new(NoTemplates)
}

/// Test config: production defaults with delivery delays disabled.
pub fn test_config() -> SupportConfig {
    SupportConfig {
        delivery: DeliveryConfig {
            delays_enabled: false,
            ..DeliveryConfig::default()
        },
        ..SupportConfig::default()
    }
}

pub fn delivery_service(config: &SupportConfig) -> Arc<DeliveryService> {
    Arc::new(DeliveryService::new(
        config.delivery.clone(),
        OperatorRegistry::default(),
    ))
}

pub fn orchestrator(pool: PgPool, gateway: Arc<dyn ClassificationGateway>) -> MessageOrchestrator {
    orchestrator_with_delivery(pool, gateway).0
}

/// Orchestrator plus its delivery service, for tests that subscribe to the
/// operator feed.
pub fn orchestrator_with_delivery(
    pool: PgPool,
    gateway: Arc<dyn ClassificationGateway>,
) -> (MessageOrchestrator, Arc<DeliveryService>) {
    let config = test_config();
    let delivery = delivery_service(&config);
    let orchestrator =
        MessageOrchestrator::new(pool, config, gateway, renderer(), Arc::clone(&delivery));
    (orchestrator, delivery)
}

pub fn channel() -> SessionChannel {
    SessionChannel::default()
}
