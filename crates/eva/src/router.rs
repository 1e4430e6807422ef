use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{AgentError, AgentResult};
use crate::handlers::{HandlerDescriptor, HandlerId};
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{OutputSchema, Provider};
use crate::timeout::with_deadline;

/// The handler named by the model.
///
/// Values outside the closed enumeration are kept instead of failing
/// deserialization, so the dispatcher can apply its own fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteTarget {
    Known(HandlerId),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    #[serde(alias = "handler")]
    pub next_agent: RouteTarget,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl RouteDecision {
    pub fn new(handler: HandlerId) -> Self {
        Self {
            next_agent: RouteTarget::Known(handler),
            reasoning: None,
        }
    }
}

/// Classifies a query into one of the catalog's handlers
pub struct Router {
    provider: Arc<dyn Provider>,
    prompt: String,
    schema: OutputSchema,
    call_timeout: Option<Duration>,
    fallback: HandlerId,
}

impl Router {
    /// Build a router offering every handler in `catalog`
    pub fn new(provider: Arc<dyn Provider>, catalog: &[HandlerDescriptor]) -> AgentResult<Self> {
        let mut context = HashMap::new();
        context.insert("handlers", catalog);
        let prompt = load_prompt_file("router.md", &context)
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        let ids: Vec<HandlerId> = catalog.iter().map(|d| d.id).collect();
        Ok(Self {
            provider,
            prompt,
            schema: route_schema(&ids),
            call_timeout: None,
            fallback: HandlerId::FALLBACK,
        })
    }

    pub fn with_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Handler chosen whenever the decision call fails
    pub fn with_fallback(mut self, fallback: HandlerId) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> HandlerId {
        self.fallback
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    /// Decide which handler should answer `query`.
    ///
    /// Makes exactly one structured model call. Any failure, including a reply that
    /// does not match the decision schema, names the configured fallback handler.
    pub async fn decide(&self, query: &str) -> RouteDecision {
        match self.try_decide(query).await {
            Ok(decision) => {
                info!(
                    next_agent = ?decision.next_agent,
                    reasoning = decision.reasoning.as_deref().unwrap_or(""),
                    "router decision"
                );
                decision
            }
            Err(e) => {
                warn!(error = %e, "router failed, defaulting to {}", self.fallback);
                RouteDecision::new(self.fallback)
            }
        }
    }

    async fn try_decide(&self, query: &str) -> AgentResult<RouteDecision> {
        let messages = [
            Message::system().with_text(&self.prompt),
            Message::user().with_text(query),
        ];

        let (value, _usage) = with_deadline(self.call_timeout, "router decision", async {
            self.provider
                .complete_structured(&messages, &self.schema)
                .await
                .map_err(AgentError::oracle)
        })
        .await?;

        serde_json::from_value(value).map_err(AgentError::oracle)
    }
}

/// Structured output schema restricting the decision to `ids`
pub fn route_schema(ids: &[HandlerId]) -> OutputSchema {
    let names: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    OutputSchema::new(
        "route_decision",
        json!({
            "type": "object",
            "properties": {
                "next_agent": {
                    "type": "string",
                    "enum": names,
                    "description": "The agent to route the query to based on its content."
                },
                "reasoning": {
                    "type": ["string", "null"],
                    "description": "Brief reasoning for the routing decision."
                }
            },
            "required": ["next_agent", "reasoning"],
            "additionalProperties": false
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::default_catalog;
    use crate::models::role::Role;
    use crate::models::tool::Tool;
    use crate::providers::base::Usage;
    use crate::providers::mock::MockProvider;
    use async_trait::async_trait;

    fn router(provider: Arc<MockProvider>) -> Router {
        Router::new(provider, &default_catalog().unwrap()).unwrap()
    }

    #[test]
    fn test_decision_deserialization() -> anyhow::Result<()> {
        let decision: RouteDecision =
            serde_json::from_value(json!({"next_agent": "slack_mgmt_agent", "reasoning": "Slack"}))?;
        assert_eq!(
            decision.next_agent,
            RouteTarget::Known(HandlerId::SlackMgmtAgent)
        );
        assert_eq!(decision.reasoning.as_deref(), Some("Slack"));

        let decision: RouteDecision = serde_json::from_value(json!({"handler": "ckb_agent"}))?;
        assert_eq!(decision.next_agent, RouteTarget::Known(HandlerId::CkbAgent));
        assert_eq!(decision.reasoning, None);

        let decision: RouteDecision = serde_json::from_value(json!({"next_agent": "pirate_agent"}))?;
        assert_eq!(
            decision.next_agent,
            RouteTarget::Unknown("pirate_agent".to_string())
        );

        assert!(serde_json::from_value::<RouteDecision>(json!({"reasoning": "x"})).is_err());
        Ok(())
    }

    #[test]
    fn test_prompt_lists_catalog() {
        let router = router(Arc::new(MockProvider::default()));
        for id in HandlerId::all() {
            assert!(router.prompt().contains(&format!("- {}: ", id)));
        }
        assert!(router.prompt().contains("Do not answer the query yourself."));

        let names = &router.schema().schema["properties"]["next_agent"]["enum"];
        assert_eq!(names.as_array().unwrap().len(), HandlerId::all().len());
    }

    #[tokio::test]
    async fn test_decide() {
        let provider = Arc::new(
            MockProvider::default()
                .with_decision(json!({"next_agent": "therapist_agent", "reasoning": "feelings"})),
        );
        let decision = router(provider.clone()).decide("I feel sad").await;

        assert_eq!(
            decision.next_agent,
            RouteTarget::Known(HandlerId::TherapistAgent)
        );
        assert_eq!(provider.structured_count(), 1);
        assert_eq!(provider.complete_count(), 0);

        let sent = &provider.structured_calls()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].text().contains("therapist_agent"));
        assert_eq!(sent[1].role, Role::User);
        assert_eq!(sent[1].text(), "I feel sad");
    }

    #[tokio::test]
    async fn test_decide_fault_falls_back() {
        let provider = Arc::new(MockProvider::default().with_decision_fault("provider down"));
        let decision = router(provider.clone()).decide("hello").await;

        assert_eq!(decision, RouteDecision::new(HandlerId::GeneralChatAgent));
        assert_eq!(decision.reasoning, None);
        assert_eq!(provider.structured_count(), 1);
    }

    #[tokio::test]
    async fn test_decide_schema_violation_falls_back() {
        let provider = Arc::new(MockProvider::default().with_decision(json!(["not", "an", "object"])));
        let decision = router(provider).decide("hello").await;
        assert_eq!(decision, RouteDecision::new(HandlerId::GeneralChatAgent));
    }

    #[tokio::test]
    async fn test_decide_fault_uses_configured_fallback() {
        let provider = Arc::new(MockProvider::default().with_decision_fault("provider down"));
        let router = router(provider).with_fallback(HandlerId::CkbAgent);
        assert_eq!(router.fallback(), HandlerId::CkbAgent);

        let decision = router.decide("hello").await;
        assert_eq!(decision, RouteDecision::new(HandlerId::CkbAgent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decide_timeout_falls_back() {
        struct SlowProvider;

        #[async_trait]
        impl Provider for SlowProvider {
            async fn complete(
                &self,
                _messages: &[Message],
                _tools: &[Tool],
            ) -> anyhow::Result<(Message, Usage)> {
                Ok((Message::assistant().with_text("unused"), Usage::default()))
            }

            async fn complete_structured(
                &self,
                _messages: &[Message],
                _schema: &OutputSchema,
            ) -> anyhow::Result<(serde_json::Value, Usage)> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok((json!({"next_agent": "slack_mgmt_agent"}), Usage::default()))
            }
        }

        let router = Router::new(Arc::new(SlowProvider), &default_catalog().unwrap())
            .unwrap()
            .with_timeout(Some(Duration::from_secs(1)))
            .with_fallback(HandlerId::WebSearchAgent);

        let decision = router.decide("anything").await;
        assert_eq!(decision, RouteDecision::new(HandlerId::WebSearchAgent));
    }

    #[tokio::test]
    async fn test_decide_keeps_unknown_identifier() {
        let provider = Arc::new(MockProvider::default().with_decision(json!({"next_agent": "pirate_agent"})));
        let decision = router(provider).decide("arr").await;
        assert_eq!(
            decision.next_agent,
            RouteTarget::Unknown("pirate_agent".to_string())
        );
    }
}
