use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default Ollama endpoint when the config leaves it unset.
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Closed set of supported provider kinds.
///
/// Adding a provider means adding one variant here and one branch in
/// `AgentClient::from_config`; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Ollama => "ollama",
        }
    }

    /// Returns true when the provider needs an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::UnknownProvider {
                kind: other.to_string(),
            }),
        }
    }
}

/// Resolved provider configuration handed over by the settings collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub endpoint: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim().to_string());
        self
    }

    /// Checks that the config is usable before any client is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind.requires_api_key() && self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey { kind: self.kind });
        }
        Ok(())
    }

    /// Endpoint to use for Ollama, falling back to the local default.
    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or(DEFAULT_OLLAMA_ENDPOINT)
    }
}

// Credential material is read-only input and must never reach logs, so the
// Debug form redacts it.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_is_a_configuration_error() {
        let parsed = "mistral".parse::<ProviderKind>();
        assert!(matches!(
            parsed,
            Err(ConfigError::UnknownProvider { kind }) if kind == "mistral"
        ));
    }

    #[test]
    fn cloud_provider_without_key_fails_validation() {
        let config = ProviderConfig::new(ProviderKind::Anthropic, "claude-sonnet-4-5", "");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey { kind: ProviderKind::Anthropic })
        ));
    }

    #[test]
    fn ollama_needs_no_key_and_defaults_its_endpoint() {
        let config = ProviderConfig::new(ProviderKind::Ollama, "llama3.2", "");
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint_or_default(), DEFAULT_OLLAMA_ENDPOINT);

        let config = config.with_endpoint("http://10.0.0.5:11434");
        assert_eq!(config.endpoint_or_default(), "http://10.0.0.5:11434");
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini", "sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
