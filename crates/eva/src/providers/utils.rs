use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use super::base::{OutputSchema, Usage};
use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::Tool => {
                // Each response becomes its own "tool" message
                for response in message.content.iter().filter_map(|c| c.as_tool_response()) {
                    messages_spec.push(json!({
                        "role": "tool",
                        "content": response.output,
                        "tool_call_id": response.id,
                    }));
                }
            }
            role => {
                let mut converted = json!({ "role": role });
                let text = message.text();
                if !text.is_empty() {
                    converted["content"] = json!(text);
                }

                let tool_calls: Vec<Value> = message
                    .content
                    .iter()
                    .filter_map(|c| c.as_tool_request())
                    .filter_map(|request| {
                        // A request the model botched is not replayed
                        let tool_call = request.tool_call.as_ref().ok()?;
                        Some(json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&tool_call.name),
                                "arguments": tool_call.arguments.to_string(),
                            }
                        }))
                    })
                    .collect();

                if !tool_calls.is_empty() {
                    converted["tool_calls"] = json!(tool_calls);
                    if converted.get("content").is_none() {
                        converted["content"] = Value::Null;
                    }
                }

                if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
                    messages_spec.push(converted);
                }
            }
        }
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// OpenAI `response_format` requesting output that matches `schema`
pub fn schema_to_response_format(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "schema": schema.schema,
            "strict": true,
        }
    })
}

/// Build a chat completion request body
pub fn create_request(
    model: &str,
    messages: &[Message],
    tools: &[Tool],
    temperature: Option<f32>,
    max_tokens: Option<i32>,
) -> Result<Value> {
    let mut payload = json!({
        "model": model,
        "messages": messages_to_openai_spec(messages),
    });

    let object = payload
        .as_object_mut()
        .ok_or_else(|| anyhow!("Request payload is not an object"))?;
    if !tools.is_empty() {
        object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
    }
    if let Some(temp) = temperature {
        object.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = max_tokens {
        object.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(payload)
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::MalformedActionRequest(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_tool_request(id, Err(error));
                continue;
            }

            // Arguments that are not valid JSON are kept verbatim; the handler
            // treats any non-object payload as empty arguments.
            let params = serde_json::from_str::<Value>(arguments)
                .unwrap_or_else(|_| Value::String(arguments.to_string()));
            message = message.with_tool_request(id, Ok(ToolCall::new(function_name, params)));
        }
    }

    Ok(message)
}

/// Extract and parse the JSON document returned in structured output mode
pub fn openai_response_to_structured(response: &Value) -> Result<Value> {
    let original = response
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;

    if let Some(refusal) = original.get("refusal").and_then(|r| r.as_str()) {
        return Err(anyhow!("Model refused to answer: {}", refusal));
    }

    let content = original
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Structured response has no content"))?;
    serde_json::from_str(content).map_err(|e| anyhow!("Structured response is not JSON: {}", e))
}

pub fn get_usage(data: &Value) -> Result<Usage> {
    let usage = data
        .get("usage")
        .ok_or_else(|| anyhow!("No usage data in response"))?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Ok(Usage::new(input_tokens, output_tokens, total_tokens))
}

/// Fail with the provider's own error message if the body reports one
pub fn check_response_error(response: &Value) -> Result<()> {
    match response.get("error") {
        Some(error) => Err(anyhow!("Provider API error: {}", error)),
        None => Ok(()),
    }
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}
