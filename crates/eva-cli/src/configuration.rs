use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use config::{Config, Environment, File};
use eva::dispatcher::DispatcherConfig;
use eva::handlers::HandlerId;
use eva::providers::configs::{
    OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig, OLLAMA_HOST, OLLAMA_MODEL,
    OPENAI_HOST, OPENAI_MODEL,
};
use eva::providers::factory::ProviderType;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default settings file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "eva";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Ollama {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Ollama { .. } => ProviderType::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderSettings::OpenAi { model, .. } | ProviderSettings::Ollama { model, .. } => model,
        }
    }

    pub fn with_model(mut self, new_model: String) -> Self {
        match &mut self {
            ProviderSettings::OpenAi { model, .. } | ProviderSettings::Ollama { model, .. } => {
                *model = new_model
            }
        }
        self
    }

    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
                ..OpenAiProviderConfig::new(api_key)
            }),
            ProviderSettings::Ollama {
                host,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                temperature,
                max_tokens,
                ..OllamaProviderConfig::default()
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DispatchSettings {
    /// Per-call limit for model and capability calls, unlimited when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_fallback")]
    pub fallback: HandlerId,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            fallback: default_fallback(),
        }
    }
}

impl DispatchSettings {
    pub fn into_config(self) -> DispatcherConfig {
        DispatcherConfig {
            call_timeout: self.timeout_secs.map(Duration::from_secs),
            fallback: self.fallback,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
}

impl Settings {
    /// Load settings from defaults, the settings file and the environment, in that order.
    ///
    /// An explicit `path` must exist; otherwise `eva.toml` in the working directory is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.type", ProviderType::OpenAi.to_string())?
            .set_default("dispatch.fallback", HandlerId::FALLBACK.to_string())?;

        // The conventional variable, overridden by EVA_PROVIDER__API_KEY
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_default("provider.api_key", api_key)?;
        }

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            missing_field(&err)
                .map(|field| ConfigError::MissingEnvVar {
                    env_var: to_env_var(&field),
                })
                .unwrap_or(ConfigError::Other(err))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                env_var: to_env_var("dispatch.timeout_secs"),
                reason: "must be at least one second".to_string(),
            });
        }
        if let ProviderSettings::OpenAi { api_key, .. } = &self.provider {
            if api_key.trim().is_empty() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var("api_key"),
                });
            }
        }
        Ok(())
    }
}

/// Name of the field a deserialization error complains about, if it is a missing one
fn missing_field(err: &config::ConfigError) -> Option<String> {
    if let config::ConfigError::NotFound(field) = err {
        return Some(field.clone());
    }
    let message = err.to_string();
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_ollama_host() -> String {
    OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    OLLAMA_MODEL.to_string()
}

fn default_fallback() -> HandlerId {
    HandlerId::FALLBACK
}
