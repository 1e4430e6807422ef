use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;

use super::base::{OutputSchema, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_response_error, create_request, get_usage, openai_response_to_message,
    openai_response_to_structured, schema_to_response_format,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}\nPayload: {}", status, payload)),
        }
    }

    fn request(&self, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        create_request(
            &self.config.model,
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
        )
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        let payload = self.request(messages, tools)?;
        let response = self.post(payload).await?;
        check_response_error(&response)?;

        let message = openai_response_to_message(&response)?;
        let usage = get_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        let mut payload = self.request(messages, &[])?;
        payload["response_format"] = schema_to_response_format(schema);

        let response = self.post(payload).await?;
        check_response_error(&response)?;

        let value = openai_response_to_structured(&response)?;
        let usage = get_usage(&response).unwrap_or_default();

        Ok((value, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(host: String) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host,
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            ..OpenAiProviderConfig::new("test_api_key")
        }
    }

    async fn _setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config(mock_server.uri())).unwrap();
        (mock_server, provider)
    }

    fn conversation() -> Vec<Message> {
        vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello?"),
        ]
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hi there!",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) = _setup_mock_server(response_body).await;
        let (message, usage) = provider.complete(&conversation(), &[]).await?;

        assert_eq!(message.text(), "Hi there!");
        assert!(!message.has_tool_request());
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "run_slack_dev_tool",
                            "arguments": "{\"task_description\":\"Run_Dev_Tool\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_, provider) = _setup_mock_server(response_body).await;

        let tool = Tool::new(
            "run_slack_dev_tool",
            "Runs a placeholder development tool",
            json!({
                "type": "object",
                "properties": {
                    "task_description": {"type": ["string", "null"]}
                }
            }),
        );

        let (message, _) = provider.complete(&conversation(), &[tool]).await?;

        let request = message.tool_request().expect("Expected a tool request");
        let tool_call = request.tool_call.as_ref().unwrap();
        assert_eq!(request.id, "call_123");
        assert_eq!(tool_call.name, "run_slack_dev_tool");
        assert_eq!(tool_call.arguments, json!({"task_description": "Run_Dev_Tool"}));
        assert_eq!(message.text(), "");

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_structured() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_schema"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"next_agent\":\"slack_mgmt_agent\",\"reasoning\":\"Slack task\"}"
                    }
                }]
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config(mock_server.uri()))?;
        let schema = OutputSchema::new("route_decision", json!({"type": "object"}));
        let (value, usage) = provider.complete_structured(&conversation(), &schema).await?;

        assert_eq!(value["next_agent"], "slack_mgmt_agent");
        assert_eq!(usage, Usage::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config(mock_server.uri()))?;
        let result = provider.complete(&conversation(), &[]).await;
        assert!(result.unwrap_err().to_string().contains("Server error"));
        Ok(())
    }

    #[tokio::test]
    async fn test_error_body() -> Result<()> {
        let (_, provider) = _setup_mock_server(json!({
            "error": {"message": "Invalid API key", "code": "invalid_api_key"}
        }))
        .await;

        let result = provider.complete(&conversation(), &[]).await;
        assert!(result.is_err());
        Ok(())
    }
}
