#![deny(unsafe_code)]

//! Model provider adapter, request normalizer, and streaming generator.
//!
//! Resolves a provider configuration into a callable agent, flattens the
//! UI's structured history into the request form providers expect, and
//! re-emits the provider's event stream as an ordered, provider-agnostic
//! chunk sequence with cooperative cancellation.

mod agent;
mod config;
mod error;
mod normalize;
mod stream;

pub use agent::AgentClient;
pub use config::{DEFAULT_OLLAMA_ENDPOINT, ProviderConfig, ProviderKind};
pub use error::{ConfigError, ProviderError, ProviderResult};
pub use normalize::{ProviderMessage, RequestParts, flatten, normalize};
pub use stream::{
    ChunkStream, ChunkStreamHandle, ProviderWorker, StreamRequest, chunk_channel,
    open_chunk_stream,
};
