use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::capabilities::ActionRegistry;
use crate::errors::{AgentError, AgentResult};
use crate::handler::{Handler, TurnResult};
use crate::handlers::{default_catalog, HandlerDescriptor, HandlerId};
use crate::providers::base::Provider;
use crate::router::{RouteDecision, RouteTarget, Router};

/// Knobs shared by the router and every handler
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Upper bound on each model call and each capability invocation
    pub call_timeout: Option<Duration>,
    /// Handler used when the router names nothing usable
    pub fallback: HandlerId,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            call_timeout: None,
            fallback: HandlerId::FALLBACK,
        }
    }
}

/// Runs one turn end to end: route, then hand the query to exactly one handler
pub struct Dispatcher {
    router: Router,
    handlers: HashMap<HandlerId, Handler>,
    fallback: HandlerId,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        catalog: Vec<HandlerDescriptor>,
        registry: &ActionRegistry,
        config: DispatcherConfig,
    ) -> AgentResult<Self> {
        if !catalog.iter().any(|d| d.id == config.fallback) {
            return Err(AgentError::UnknownHandler(format!(
                "fallback handler {} is not in the catalog",
                config.fallback
            )));
        }

        let router = Router::new(Arc::clone(&provider), &catalog)?
            .with_timeout(config.call_timeout)
            .with_fallback(config.fallback);

        let mut handlers = HashMap::new();
        for descriptor in catalog {
            let id = descriptor.id;
            let handler = Handler::new(descriptor, Arc::clone(&provider), registry)?
                .with_timeout(config.call_timeout);
            if handlers.insert(id, handler).is_some() {
                return Err(AgentError::Internal(format!(
                    "handler {} appears twice in the catalog",
                    id
                )));
            }
        }

        Ok(Self {
            router,
            handlers,
            fallback: config.fallback,
        })
    }

    /// The standard catalog with the simulated dev tools
    pub fn with_defaults(provider: Arc<dyn Provider>) -> AgentResult<Self> {
        Self::new(
            provider,
            default_catalog()?,
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig::default(),
        )
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn handler(&self, id: HandlerId) -> Option<&Handler> {
        self.handlers.get(&id)
    }

    pub fn fallback(&self) -> HandlerId {
        self.fallback
    }

    /// Map a routing decision to a registered handler
    pub fn select(&self, decision: &RouteDecision) -> HandlerId {
        match &decision.next_agent {
            RouteTarget::Known(id) if self.handlers.contains_key(id) => *id,
            RouteTarget::Known(id) => {
                warn!(handler = %id, fallback = %self.fallback, "handler not registered, using fallback");
                self.fallback
            }
            RouteTarget::Unknown(name) => {
                warn!(handler = %name, fallback = %self.fallback, "{}", AgentError::UnknownHandler(name.clone()));
                self.fallback
            }
        }
    }

    /// Answer one query.
    ///
    /// Exactly one router call and one handler run per turn. Never fails: every
    /// fault ends up as the text of the returned result.
    pub async fn run_turn(&self, query: &str) -> TurnResult {
        let span = info_span!("turn", turn_id = %Uuid::new_v4(), query_len = query.len());
        async {
            let decision = self.router.decide(query).await;
            let id = self.select(&decision);
            info!(handler = %id, "dispatching");

            let handler = match self.handlers.get(&id) {
                Some(handler) => handler,
                // Checked in `new`
                None => &self.handlers[&self.fallback],
            };
            handler.handle(query).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TurnOutcome;
    use crate::providers::mock::MockProvider;
    use crate::models::message::Message;
    use serde_json::json;

    #[test]
    fn test_select() {
        let dispatcher = Dispatcher::with_defaults(Arc::new(MockProvider::default())).unwrap();

        let decision = RouteDecision::new(HandlerId::WebSearchAgent);
        assert_eq!(dispatcher.select(&decision), HandlerId::WebSearchAgent);

        let decision = RouteDecision {
            next_agent: RouteTarget::Unknown("pirate_agent".to_string()),
            reasoning: None,
        };
        assert_eq!(dispatcher.select(&decision), HandlerId::GeneralChatAgent);
    }

    #[test]
    fn test_select_unregistered_falls_back() {
        let catalog: Vec<HandlerDescriptor> = default_catalog()
            .unwrap()
            .into_iter()
            .filter(|d| d.id != HandlerId::HubspotMgmtAgent)
            .collect();
        let dispatcher = Dispatcher::new(
            Arc::new(MockProvider::default()),
            catalog,
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig::default(),
        )
        .unwrap();

        assert!(dispatcher.handler(HandlerId::HubspotMgmtAgent).is_none());
        let decision = RouteDecision::new(HandlerId::HubspotMgmtAgent);
        assert_eq!(dispatcher.select(&decision), HandlerId::GeneralChatAgent);
    }

    #[test]
    fn test_missing_fallback_rejected() {
        let catalog: Vec<HandlerDescriptor> = default_catalog()
            .unwrap()
            .into_iter()
            .filter(|d| d.id != HandlerId::GeneralChatAgent)
            .collect();
        let result = Dispatcher::new(
            Arc::new(MockProvider::default()),
            catalog,
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig::default(),
        );
        assert!(matches!(result, Err(AgentError::UnknownHandler(_))));
    }

    #[test]
    fn test_custom_fallback() {
        let dispatcher = Dispatcher::new(
            Arc::new(MockProvider::default()),
            default_catalog().unwrap(),
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig {
                fallback: HandlerId::CkbAgent,
                ..DispatcherConfig::default()
            },
        )
        .unwrap();
        let decision = RouteDecision {
            next_agent: RouteTarget::Unknown("nope".to_string()),
            reasoning: None,
        };
        assert_eq!(dispatcher.select(&decision), HandlerId::CkbAgent);
    }

    #[test]
    fn test_duplicate_handler_rejected() {
        let mut catalog = default_catalog().unwrap();
        catalog.push(catalog[0].clone());
        let result = Dispatcher::new(
            Arc::new(MockProvider::default()),
            catalog,
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig::default(),
        );
        assert!(matches!(result, Err(AgentError::Internal(_))));
    }

    #[tokio::test]
    async fn test_custom_fallback_covers_router_fault() {
        let provider = Arc::new(
            MockProvider::new(vec![
                Message::assistant().with_text("From the knowledge base."),
                Message::assistant().with_text("Still the knowledge base."),
            ])
            .with_decision_fault("down")
            .with_decision(json!({"next_agent": "pirate"})),
        );
        let dispatcher = Dispatcher::new(
            provider,
            default_catalog().unwrap(),
            &ActionRegistry::with_dev_tools(),
            DispatcherConfig {
                fallback: HandlerId::CkbAgent,
                ..DispatcherConfig::default()
            },
        )
        .unwrap();
        assert_eq!(dispatcher.router().fallback(), HandlerId::CkbAgent);

        let after_fault = dispatcher.run_turn("hello").await;
        let after_unknown = dispatcher.run_turn("hello").await;

        assert_eq!(after_fault.responder, HandlerId::CkbAgent);
        assert_eq!(after_unknown.responder, HandlerId::CkbAgent);
    }

    #[tokio::test]
    async fn test_run_turn_routes_once() {
        let provider = Arc::new(
            MockProvider::new(vec![Message::assistant().with_text("Breathe in slowly.")])
                .with_decision(json!({"next_agent": "therapist_agent", "reasoning": "stress"})),
        );
        let dispatcher = Dispatcher::with_defaults(provider.clone()).unwrap();

        let result = dispatcher.run_turn("I'm stressed").await;

        assert_eq!(result.responder, HandlerId::TherapistAgent);
        assert_eq!(result.final_response, "Breathe in slowly.");
        assert_eq!(result.outcome, TurnOutcome::Direct);
        assert_eq!(provider.structured_count(), 1);
        assert_eq!(provider.complete_count(), 1);
    }
}
