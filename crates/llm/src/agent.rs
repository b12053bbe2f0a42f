use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::Prompt;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{ProviderError, ProviderResult};

// Anthropic requires an explicit output cap on every request.
const ANTHROPIC_MAX_TOKENS: u64 = 4096;

/// Enum-based agent wrapper resolving one provider config into a uniform
/// callable client. One variant and one factory branch per provider kind.
#[derive(Clone)]
pub enum AgentClient {
    OpenAi(Agent<rig::providers::openai::responses_api::ResponsesCompletionModel>),
    Anthropic(Agent<rig::providers::anthropic::completion::CompletionModel>),
    Google(Agent<rig::providers::gemini::completion::CompletionModel>),
    Ollama(Agent<rig::providers::ollama::CompletionModel>),
}

fn client_init<E: std::fmt::Display>(
    stage: &'static str,
    kind: ProviderKind,
) -> impl FnOnce(E) -> ProviderError {
    move |source| ProviderError::ClientInit {
        stage,
        kind,
        message: source.to_string(),
    }
}

impl AgentClient {
    /// Resolves a provider config into a ready agent.
    ///
    /// No side effects beyond constructing the client handle; the credential
    /// is read-only input. The optional preamble is the conversation's folded
    /// system text.
    pub fn from_config(config: &ProviderConfig, preamble: Option<&str>) -> ProviderResult<Self> {
        config.validate()?;
        let preamble = preamble.map(str::trim).filter(|text| !text.is_empty());

        match config.kind {
            ProviderKind::OpenAi => {
                let client = rig::providers::openai::Client::new(&config.api_key)
                    .map_err(client_init("openai-client", config.kind))?;
                let mut builder = client.agent(&config.model);
                if let Some(preamble) = preamble {
                    builder = builder.preamble(preamble);
                }
                Ok(Self::OpenAi(builder.build()))
            }
            ProviderKind::Anthropic => {
                let client = rig::providers::anthropic::Client::new(&config.api_key)
                    .map_err(client_init("anthropic-client", config.kind))?;
                let mut builder = client
                    .agent(&config.model)
                    .max_tokens(ANTHROPIC_MAX_TOKENS);
                if let Some(preamble) = preamble {
                    builder = builder.preamble(preamble);
                }
                Ok(Self::Anthropic(builder.build()))
            }
            ProviderKind::Google => {
                let client = rig::providers::gemini::Client::new(&config.api_key)
                    .map_err(client_init("gemini-client", config.kind))?;
                let mut builder = client.agent(&config.model);
                if let Some(preamble) = preamble {
                    builder = builder.preamble(preamble);
                }
                Ok(Self::Google(builder.build()))
            }
            ProviderKind::Ollama => {
                let client = rig::providers::ollama::Client::builder()
                    .api_key(rig::client::Nothing)
                    .base_url(config.endpoint_or_default())
                    .build()
                    .map_err(client_init("ollama-client", config.kind))?;
                let mut builder = client.agent(&config.model);
                if let Some(preamble) = preamble {
                    builder = builder.preamble(preamble);
                }
                Ok(Self::Ollama(builder.build()))
            }
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Anthropic(_) => ProviderKind::Anthropic,
            Self::Google(_) => ProviderKind::Google,
            Self::Ollama(_) => ProviderKind::Ollama,
        }
    }

    /// Non-streaming completion, used for title generation.
    pub async fn prompt_text(&self, prompt: &str) -> ProviderResult<String> {
        let response = match self {
            Self::OpenAi(agent) => agent.prompt(prompt).await,
            Self::Anthropic(agent) => agent.prompt(prompt).await,
            Self::Google(agent) => agent.prompt(prompt).await,
            Self::Ollama(agent) => agent.prompt(prompt).await,
        }
        .map_err(|source| ProviderError::Completion {
            stage: "prompt",
            message: source.to_string(),
        })?;

        Ok(response.trim().to_string())
    }
}
