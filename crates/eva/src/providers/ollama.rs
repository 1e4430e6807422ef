use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;

use super::base::{OutputSchema, Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{
    check_response_error, create_request, get_usage, openai_response_to_message,
    openai_response_to_structured, schema_to_response_format,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Local models served through Ollama's OpenAI-compatible endpoint
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}\nPayload: {}", status, payload)),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        let payload = create_request(
            &self.config.model,
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
        )?;
        let response = self.post(payload).await?;
        check_response_error(&response)?;

        let message = openai_response_to_message(&response)?;
        Ok((message, get_usage(&response).unwrap_or_default()))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        let mut payload = create_request(
            &self.config.model,
            messages,
            &[],
            self.config.temperature,
            self.config.max_tokens,
        )?;
        payload["response_format"] = schema_to_response_format(schema);

        let response = self.post(payload).await?;
        check_response_error(&response)?;

        let value = openai_response_to_structured(&response)?;
        Ok((value, get_usage(&response).unwrap_or_default()))
    }
}
