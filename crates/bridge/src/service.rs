use std::sync::Arc;

use futures::future::BoxFuture;
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;

use plume_llm::{
    AgentClient, ConfigError, ProviderConfig, ProviderError, StreamRequest, flatten, normalize,
    open_chunk_stream,
};
use plume_protocol::Message;

use crate::pump::serve;
use crate::session::{UiEndpoint, open_session};

/// Fallback title when generation produces nothing usable.
const UNTITLED: &str = "New Chat";
const MAX_TITLE_CHARS: usize = 100;

/// The provider-settings collaborator: resolves the current
/// `{kind, model, credential, endpoint?}` tuple on demand.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<ProviderConfig, ConfigError>>;
}

#[derive(Debug, Snafu)]
pub enum ServiceError {
    #[snafu(display("provider configuration unavailable: {source}"))]
    Configuration { source: ConfigError },
    #[snafu(display("{source}"))]
    Provider { source: ProviderError },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Backend facade: holds the credential lookup and turns a message history
/// into a live session the UI can consume.
///
/// Each send gets its own isolated session; several conversations may stream
/// concurrently, but one send drives exactly one generation.
pub struct InferenceService {
    config: Arc<dyn ConfigSource>,
}

impl InferenceService {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self { config }
    }

    /// Starts one streaming generation and returns the UI endpoint for it.
    ///
    /// Configuration and client-construction failures surface here, before
    /// any session exists; failures past this point travel the data channel
    /// as terminal `error` chunks.
    pub async fn send(&self, messages: &[Message]) -> ServiceResult<UiEndpoint> {
        let config = self.config.load().await.context(ConfigurationSnafu)?;

        let normalized = normalize(messages);
        let parts = flatten(&normalized);

        let client =
            AgentClient::from_config(&config, parts.preamble.as_deref()).context(ProviderSnafu)?;
        let handle = open_chunk_stream(
            client,
            StreamRequest::new(parts.messages),
            CancellationToken::new(),
        )
        .context(ProviderSnafu)?;

        let (backend, ui) = open_session();
        tokio::spawn(async move {
            let state = serve(handle, backend).await;
            tracing::debug!(?state, "inference session closed");
        });

        Ok(ui)
    }

    /// Request/response text generation for conversation titles.
    pub async fn generate_title(&self, prompt: &str) -> ServiceResult<String> {
        let config = self.config.load().await.context(ConfigurationSnafu)?;
        let client = AgentClient::from_config(&config, None).context(ProviderSnafu)?;
        let raw = client.prompt_text(prompt).await.context(ProviderSnafu)?;
        Ok(clean_title(&raw))
    }
}

/// Reduces a model reply to a usable single-line title.
fn clean_title(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .next()
        .unwrap_or(UNTITLED)
        .trim()
        .to_string();

    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else if cleaned.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{truncated}...")
    } else {
        cleaned
    }
}
