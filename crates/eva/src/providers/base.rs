use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// JSON schema the model output must conform to in structured mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new<S: Into<String>>(name: S, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Base trait for language model providers (OpenAI, Ollama, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant message. When `tools` is non-empty the reply may
    /// carry a tool request instead of (or alongside) text.
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)>;

    /// Generate a JSON value constrained by `schema`
    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)>;
}
