use super::{
    base::Provider, configs::ProviderConfig, ollama::OllamaProvider, openai::OpenAiProvider,
};
use anyhow::Result;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    OpenAi,
    Ollama,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
            ProviderConfig::Ollama(_) => ProviderType::Ollama,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Arc::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Ollama(ollama_config) => Ok(Arc::new(OllamaProvider::new(ollama_config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::{OllamaProviderConfig, OpenAiProviderConfig};
    use std::str::FromStr;

    #[test]
    fn test_provider_type_names() {
        assert_eq!(ProviderType::from_str("openai").unwrap(), ProviderType::OpenAi);
        assert_eq!(ProviderType::Ollama.to_string(), "ollama");
    }

    #[test]
    fn test_get_provider() -> Result<()> {
        let config = ProviderConfig::OpenAi(OpenAiProviderConfig::new("test-key"));
        assert_eq!(config.provider_type(), ProviderType::OpenAi);
        get_provider(config)?;

        let config = ProviderConfig::Ollama(OllamaProviderConfig::default());
        assert_eq!(config.provider_type(), ProviderType::Ollama);
        get_provider(config)?;
        Ok(())
    }
}
