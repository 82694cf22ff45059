//! # Response Builder
//!
//! Turns a classified message into the single outbound reply. Template text
//! lives behind [`TemplateRenderer`]; this module owns only the selection
//! policy: which scenario template to render, the compiled fallbacks when no
//! template exists, the first-contact greeting combination, and whether the
//! reply is BOT_AUTO or BOT_ESCALATED.
//!
//! An escalated message still gets exactly one reply. When the scenario has
//! its own template that text is used, otherwise the generic escalation
//! fallback; the client is never sent a second, separate escalation notice.

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::{MessageType, Scenario};
use crate::gateway::TemplateRenderer;
use crate::orchestration::text;

/// Generic acknowledgement when classification was unavailable.
pub const FALLBACK_TEXT: &str =
    "Thanks for reaching out! I've passed your message to our support team, \
     and a specialist will get back to you shortly.";

/// Generic escalation acknowledgement when the scenario has no template.
pub const ESCALATION_TEXT: &str =
    "I've forwarded your request to a support specialist. They will contact \
     you as soon as possible.";

/// Incident acknowledgement during a detected mass outage.
pub const MASS_OUTAGE_TEXT: &str =
    "We're aware of a temporary service disruption and our team is already \
     working on it. Thank you for your patience!";

/// Default farewell, also used by the inactivity sweep.
pub const FAREWELL_TEXT: &str =
    "Is there anything else I can help you with? If not, have a great day!";

/// Default first-contact greeting prefix.
pub const GREETING_TEXT: &str = "Hello! Great to hear from you.";

const GREETING_OPENERS: &[&str] = &["hello", "hi ", "hi!", "hi,", "hey", "good "];

/// A reply ready to persist and deliver
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDraft {
    pub text: String,
    pub message_type: MessageType,
}

pub struct ResponseBuilder {
    renderer: Arc<dyn TemplateRenderer>,
}

impl ResponseBuilder {
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// Build the single reply for a classified message.
    pub async fn draft(
        &self,
        scenario: Scenario,
        requires_escalation: bool,
        is_first_message: bool,
        content: &str,
        client_id: &str,
    ) -> ResponseDraft {
        let params = Self::params(client_id, content);

        // A bare first greeting is answered by asking for the lesson time
        let template_scenario = if scenario == Scenario::Greeting
            && is_first_message
            && !text::mentions_time(content)
        {
            Scenario::GreetingTimeRequest
        } else {
            scenario
        };

        let body = match self.renderer.render(template_scenario, &params).await {
            Some(text) => text,
            None => Self::compiled_fallback(template_scenario, requires_escalation).to_string(),
        };

        let text = if is_first_message && !Self::opens_with_greeting(&body) {
            let greeting = self
                .renderer
                .render(Scenario::Greeting, &params)
                .await
                .unwrap_or_else(|| GREETING_TEXT.to_string());
            format!("{greeting}\n\n{body}")
        } else {
            body
        };

        let message_type = if requires_escalation {
            MessageType::BotEscalated
        } else {
            MessageType::BotAuto
        };

        ResponseDraft { text, message_type }
    }

    /// The reply when classification was unavailable or the input was noise.
    pub fn fallback_draft(&self) -> ResponseDraft {
        ResponseDraft {
            text: FALLBACK_TEXT.to_string(),
            message_type: MessageType::BotEscalated,
        }
    }

    fn params(client_id: &str, content: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("client_id".to_string(), client_id.to_string());
        params.insert("message".to_string(), content.to_string());
        params
    }

    fn compiled_fallback(scenario: Scenario, requires_escalation: bool) -> &'static str {
        match scenario {
            Scenario::MassOutage => MASS_OUTAGE_TEXT,
            Scenario::Farewell => FAREWELL_TEXT,
            Scenario::Greeting | Scenario::GreetingTimeRequest => GREETING_TEXT,
            _ if requires_escalation => ESCALATION_TEXT,
            _ => FALLBACK_TEXT,
        }
    }

    fn opens_with_greeting(body: &str) -> bool {
        let lower = body.trim_start().to_lowercase();
        GREETING_OPENERS.iter().any(|g| lower.starts_with(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MapRenderer(HashMap<Scenario, String>);

    #[async_trait]
    impl TemplateRenderer for MapRenderer {
        async fn render(
            &self,
            scenario: Scenario,
            _params: &HashMap<String, String>,
        ) -> Option<String> {
            self.0.get(&scenario).cloned()
        }
    }

    fn builder(templates: &[(Scenario, &str)]) -> ResponseBuilder {
        let map = templates
            .iter()
            .map(|(s, t)| (*s, t.to_string()))
            .collect();
        ResponseBuilder::new(Arc::new(MapRenderer(map)))
    }

    #[tokio::test]
    async fn test_escalated_scenario_uses_its_own_template_once() {
        let b = builder(&[(
            Scenario::ScheduleChange,
            "Sure, let's adjust your schedule.",
        )]);
        let draft = b
            .draft(Scenario::ScheduleChange, true, false, "move my lesson", "c1")
            .await;
        assert_eq!(draft.message_type, MessageType::BotEscalated);
        assert_eq!(draft.text, "Sure, let's adjust your schedule.");
    }

    #[tokio::test]
    async fn test_missing_template_falls_back_to_escalation_text() {
        let b = builder(&[]);
        let draft = b
            .draft(Scenario::Complaint, true, false, "this is bad", "c1")
            .await;
        assert_eq!(draft.text, ESCALATION_TEXT);
        assert_eq!(draft.message_type, MessageType::BotEscalated);
    }

    #[tokio::test]
    async fn test_first_message_gets_greeting_prefix() {
        let b = builder(&[
            (Scenario::TechSupportBasic, "Try restarting the app."),
            (Scenario::Greeting, "Hi there!"),
        ]);
        let draft = b
            .draft(Scenario::TechSupportBasic, false, true, "video broken", "c1")
            .await;
        assert_eq!(draft.text, "Hi there!\n\nTry restarting the app.");
        assert_eq!(draft.message_type, MessageType::BotAuto);
    }

    #[tokio::test]
    async fn test_greeting_prefix_is_skipped_when_body_already_greets() {
        let b = builder(&[(Scenario::TechSupportBasic, "Hello! Try restarting.")]);
        let draft = b
            .draft(Scenario::TechSupportBasic, false, true, "video broken", "c1")
            .await;
        assert_eq!(draft.text, "Hello! Try restarting.");
    }

    #[tokio::test]
    async fn test_bare_first_greeting_asks_for_time() {
        let b = builder(&[
            (Scenario::Greeting, "Hello!"),
            (Scenario::GreetingTimeRequest, "Hello! What time is your lesson?"),
        ]);
        let draft = b.draft(Scenario::Greeting, false, true, "hi", "c1").await;
        assert_eq!(draft.text, "Hello! What time is your lesson?");
    }

    #[tokio::test]
    async fn test_greeting_with_time_keeps_plain_greeting() {
        let b = builder(&[
            (Scenario::Greeting, "Hello!"),
            (Scenario::GreetingTimeRequest, "Hello! What time is your lesson?"),
        ]);
        let draft = b
            .draft(Scenario::Greeting, false, true, "hi, lesson at 17:00", "c1")
            .await;
        assert_eq!(draft.text, "Hello!");
    }

    #[tokio::test]
    async fn test_fallback_draft_is_escalated() {
        let draft = builder(&[]).fallback_draft();
        assert_eq!(draft.text, FALLBACK_TEXT);
        assert_eq!(draft.message_type, MessageType::BotEscalated);
    }
}
