use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";
pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Unified enum to wrap different provider configurations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// HTTP timeout for a single request
    pub timeout: Duration,
}

impl OpenAiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: OPENAI_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub timeout: Duration,
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.to_string(),
            model: OLLAMA_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(600),
        }
    }
}
