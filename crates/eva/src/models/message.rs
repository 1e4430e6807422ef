use super::role::Role;
use super::tool::ToolCall;
use crate::errors::AgentResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// A pending request from the model to invoke a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id, echoed back by the matching ToolResponse
    pub id: String,
    pub tool_call: AgentResult<ToolCall>,
}

/// The textual output of a capability, answering the request with the same id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content passed inside a message, which can be both simple text and tool content
pub enum MessageContent {
    Text(TextContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: AgentResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response<S: Into<String>, T: Into<String>>(id: S, output: T) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            output: output.into(),
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from the language model
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Self::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new message carrying capability output with the current timestamp
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(
        self,
        id: S,
        tool_call: AgentResult<ToolCall>,
    ) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>, T: Into<String>>(self, id: S, output: T) -> Self {
        self.with_content(MessageContent::tool_response(id, output))
    }

    /// All text content joined with newlines; empty when the message has none
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The pending tool request, if any. Only the first request is ever honoured.
    pub fn tool_request(&self) -> Option<&ToolRequest> {
        self.content.iter().find_map(|c| c.as_tool_request())
    }

    pub fn tool_response(&self) -> Option<&ToolResponse> {
        self.content.iter().find_map(|c| c.as_tool_response())
    }

    pub fn has_tool_request(&self) -> bool {
        self.tool_request().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use serde_json::json;

    #[test]
    fn test_text_joins_parts() {
        let message = Message::assistant().with_text("Hello").with_text("world");
        assert_eq!(message.text(), "Hello\nworld");
        assert_eq!(Message::assistant().text(), "");
    }

    #[test]
    fn test_first_tool_request_wins() {
        let message = Message::assistant()
            .with_text("")
            .with_tool_request(
                "call_1",
                Ok(ToolCall::new("run_slack_dev_tool", json!({}))),
            )
            .with_tool_request(
                "call_2",
                Ok(ToolCall::new("run_github_dev_tool", json!({}))),
            );

        let request = message.tool_request().unwrap();
        assert_eq!(request.id, "call_1");
        assert!(message.has_tool_request());
    }

    #[test]
    fn test_failed_tool_call_is_still_a_request() {
        let message = Message::assistant().with_tool_request(
            "call_1",
            Err(AgentError::MalformedActionRequest("bad json".into())),
        );
        assert!(message.tool_request().unwrap().tool_call.is_err());
    }

    #[test]
    fn test_message_serialization() -> anyhow::Result<()> {
        let message = Message::tool().with_tool_response("call_1", "done");
        let serialized = serde_json::to_string(&message)?;
        let deserialized: Message = serde_json::from_str(&serialized)?;
        assert_eq!(message, deserialized);
        assert_eq!(deserialized.role, Role::Tool);
        Ok(())
    }
}
