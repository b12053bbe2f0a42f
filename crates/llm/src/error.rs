use snafu::Snafu;

use crate::config::ProviderKind;

/// Fatal configuration problems, surfaced immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("unknown provider kind '{kind}'"))]
    UnknownProvider { kind: String },
    #[snafu(display("missing API key for provider '{kind}'"))]
    MissingApiKey { kind: ProviderKind },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("invalid provider configuration: {source}"))]
    Config { source: ConfigError },
    #[snafu(display("failed to build {kind} client on `{stage}`: {message}"))]
    ClientInit {
        stage: &'static str,
        kind: ProviderKind,
        message: String,
    },
    #[snafu(display("stream request has no messages after normalization"))]
    EmptyMessageSet { stage: &'static str },
    #[snafu(display("completion failed on `{stage}`: {message}"))]
    Completion {
        stage: &'static str,
        message: String,
    },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl From<ConfigError> for ProviderError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}
