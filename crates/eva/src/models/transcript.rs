use serde::{Deserialize, Serialize};

use super::message::Message;
use super::role::Role;
use crate::errors::{AgentError, AgentResult};

/// Ordered, append-only log of the messages produced during one turn.
///
/// The initial system and user messages are not part of the transcript; it starts
/// with the first reply from the model. Order matters because the model is replayed
/// over growing prefixes of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    ///
    /// A message carrying a tool response is rejected unless an earlier assistant
    /// message holds a tool request with the same id that has not been answered yet.
    pub fn push(&mut self, message: Message) -> AgentResult<()> {
        if let Some(response) = message.tool_response() {
            let requested = self.messages.iter().any(|m| {
                m.role == Role::Assistant
                    && m.tool_request().is_some_and(|r| r.id == response.id)
            });
            if !requested {
                return Err(AgentError::InvalidTranscript(format!(
                    "tool response {} has no matching request",
                    response.id
                )));
            }
            let answered = self
                .messages
                .iter()
                .any(|m| m.tool_response().is_some_and(|r| r.id == response.id));
            if answered {
                return Err(AgentError::InvalidTranscript(format!(
                    "tool request {} was already answered",
                    response.id
                )));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True if an assistant message already contains `text`
    pub fn has_assistant_text(&self, text: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.text().contains(text))
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
