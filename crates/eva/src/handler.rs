use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::capabilities::{args_from_map, ActionRegistry, Capability, CapabilityArgs};
use crate::errors::{AgentError, AgentResult};
use crate::handlers::{HandlerDescriptor, HandlerId};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::models::transcript::Transcript;
use crate::providers::base::Provider;
use crate::timeout::with_deadline;

/// Prefix of every reply produced by the failure path
pub const ERROR_MARKER: &str = "Sorry, I encountered an error";

/// How a turn reached its final response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The first model reply was used as-is
    Direct,
    /// The bound capability ran and a second model call synthesized the reply
    ToolInvoked,
    /// The model asked for a capability the handler does not have; its text was used
    Degraded,
    /// An oracle or capability fault was turned into an error reply
    Failed,
}

/// The outcome of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub final_response: String,
    /// The handler that produced the response
    pub responder: HandlerId,
    /// Messages appended during the turn, starting with the first model reply
    pub transcript: Transcript,
    pub outcome: TurnOutcome,
}

/// Reply text used when a turn fails
pub fn error_response(handler: HandlerId, err: &AgentError) -> String {
    format!(
        "{} while processing your request for {}. Detail: {}",
        ERROR_MARKER, handler, err
    )
}

/// One specialist: an instruction preamble plus at most one capability.
///
/// Every handler runs the same protocol. The model is called once; if it asks for
/// the bound capability, that capability runs once and the model is called a second
/// time over the whole exchange to write the final reply. No fault escapes
/// [`handle`](Self::handle).
pub struct Handler {
    descriptor: HandlerDescriptor,
    capability: Option<Arc<dyn Capability>>,
    provider: Arc<dyn Provider>,
    call_timeout: Option<Duration>,
}

impl Handler {
    /// Build a handler, resolving its bound capability from `registry`
    pub fn new(
        descriptor: HandlerDescriptor,
        provider: Arc<dyn Provider>,
        registry: &ActionRegistry,
    ) -> AgentResult<Self> {
        let capability = descriptor
            .capability
            .as_deref()
            .map(|name| registry.resolve(name))
            .transpose()?;

        Ok(Self {
            descriptor,
            capability,
            provider,
            call_timeout: None,
        })
    }

    pub fn with_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn id(&self) -> HandlerId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub async fn handle(&self, query: &str) -> TurnResult {
        let mut transcript = Transcript::new();

        match self.run(query, &mut transcript).await {
            Ok((final_response, outcome)) => {
                info!(handler = %self.id(), ?outcome, "handler finished");
                TurnResult {
                    final_response,
                    responder: self.id(),
                    transcript,
                    outcome,
                }
            }
            Err(e) => {
                error!(handler = %self.id(), error = %e, "handler failed");
                let final_response = error_response(self.id(), &e);
                if !transcript.has_assistant_text(&final_response) {
                    if let Err(e) = transcript.push(Message::assistant().with_text(&final_response)) {
                        warn!(error = %e, "could not record error reply");
                    }
                }
                TurnResult {
                    final_response,
                    responder: self.id(),
                    transcript,
                    outcome: TurnOutcome::Failed,
                }
            }
        }
    }

    async fn run(
        &self,
        query: &str,
        transcript: &mut Transcript,
    ) -> AgentResult<(String, TurnOutcome)> {
        let mut messages = vec![
            Message::system().with_text(&self.descriptor.preamble),
            Message::user().with_text(query),
        ];
        let tools: Vec<Tool> = self.capability.iter().map(|c| c.tool()).collect();

        let first = self.ask(&messages, &tools, "first response").await?;
        transcript.push(first.clone())?;

        let (capability, request) = match (&self.capability, first.tool_request()) {
            (Some(capability), Some(request)) => (capability, request),
            (None, Some(_)) => {
                debug!(handler = %self.id(), "ignoring tool request, no capability bound");
                return Ok((first.text(), TurnOutcome::Direct));
            }
            (_, None) => return Ok((first.text(), TurnOutcome::Direct)),
        };

        let call = match &request.tool_call {
            Ok(call) if call.name == capability.name() => call,
            Ok(call) => {
                warn!(
                    handler = %self.id(),
                    requested = %call.name,
                    bound = capability.name(),
                    "model requested an unexpected tool, responding without it"
                );
                return Ok((first.text(), TurnOutcome::Degraded));
            }
            Err(e) => {
                warn!(handler = %self.id(), error = %e, "malformed tool request, responding without it");
                return Ok((first.text(), TurnOutcome::Degraded));
            }
        };

        let args = match call.argument_map() {
            Some(map) => args_from_map(map),
            None => {
                warn!(handler = %self.id(), arguments = %call.arguments, "tool arguments are not an object, using none");
                CapabilityArgs::new()
            }
        };

        debug!(handler = %self.id(), tool = capability.name(), "invoking capability");
        let output = with_deadline(self.call_timeout, capability.name(), async {
            capability.invoke(args).await.map_err(|e| match e {
                AgentError::CapabilityFault { .. } => e,
                other => AgentError::capability(capability.name(), other),
            })
        })
        .await?;
        debug!(handler = %self.id(), %output, "capability output");
        transcript.push(Message::tool().with_tool_response(&request.id, output))?;

        messages.extend(transcript.messages().iter().cloned());
        let second = self.ask(&messages, &tools, "synthesis").await?;
        if second.has_tool_request() {
            debug!(handler = %self.id(), "ignoring second tool request, one call per turn");
        }
        let final_response = second.text();
        transcript.push(second)?;

        Ok((final_response, TurnOutcome::ToolInvoked))
    }

    async fn ask(&self, messages: &[Message], tools: &[Tool], step: &str) -> AgentResult<Message> {
        debug!(handler = %self.id(), step, "calling model");
        let (message, usage) = with_deadline(self.call_timeout, step, async {
            self.provider
                .complete(messages, tools)
                .await
                .map_err(AgentError::oracle)
        })
        .await?;
        debug!(handler = %self.id(), step, ?usage, "model replied");
        Ok(message)
    }
}
