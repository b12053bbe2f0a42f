use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use rig::agent::MultiTurnStreamItem;
use rig::completion::Message as RigMessage;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use snafu::ensure;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use plume_protocol::{Chunk, MessageId, Role};

use crate::agent::AgentClient;
use crate::error::{EmptyMessageSetSnafu, ProviderResult};
use crate::normalize::ProviderMessage;

pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One streaming generation request: the flattened, normalized history.
/// The final entry is the prompt the reply answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub messages: Vec<ProviderMessage>,
}

impl StreamRequest {
    pub fn new(messages: Vec<ProviderMessage>) -> Self {
        Self { messages }
    }
}

/// Consumer end of one generation: a lazy, finite, non-restartable chunk
/// sequence with a single consumer.
pub struct ChunkStream {
    chunks: mpsc::UnboundedReceiver<Chunk>,
}

impl ChunkStream {
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.chunks.recv().await
    }
}

/// Creates the channel pair a generation worker writes into.
pub fn chunk_channel() -> (mpsc::UnboundedSender<Chunk>, ChunkStream) {
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    (chunk_tx, ChunkStream { chunks: chunk_rx })
}

/// A generation in flight: the chunk sequence, the cancellation token the
/// worker polls at every yield point, and the worker future itself.
///
/// The caller owns scheduling: nothing happens until `worker` is spawned.
pub struct ChunkStreamHandle {
    pub stream: ChunkStream,
    pub cancel: CancellationToken,
    pub worker: ProviderWorker,
}

impl ChunkStreamHandle {
    pub fn new(stream: ChunkStream, cancel: CancellationToken, worker: ProviderWorker) -> Self {
        Self {
            stream,
            cancel,
            worker,
        }
    }
}

/// Opens a chunk stream for one assistant turn.
///
/// The worker emits `start` with a fresh message id, then `text-delta`
/// chunks in provider order (empty deltas are skipped), and terminates with
/// exactly one of `finish` or `error` (or with neither, when the token is
/// cancelled mid-iteration). A token already signaled when the worker starts
/// produces zero chunks.
pub fn open_chunk_stream(
    client: AgentClient,
    request: StreamRequest,
    cancel: CancellationToken,
) -> ProviderResult<ChunkStreamHandle> {
    ensure!(
        !request.messages.is_empty(),
        EmptyMessageSetSnafu {
            stage: "open-chunk-stream",
        }
    );

    let (chunk_tx, stream) = chunk_channel();
    let worker: ProviderWorker = Box::pin(run_stream_worker(
        client,
        request,
        chunk_tx,
        cancel.clone(),
    ));

    Ok(ChunkStreamHandle::new(stream, cancel, worker))
}

fn to_rig_message(message: &ProviderMessage) -> Option<RigMessage> {
    match message.role {
        Role::System => None,
        Role::User => Some(RigMessage::user(message.content.clone())),
        Role::Assistant => Some(RigMessage::assistant(message.content.clone())),
    }
}

/// Runs the per-provider stream pump.
///
/// The stream types differ per provider, so the shared loop is expanded per
/// match arm.
macro_rules! pump_agent_stream {
    ($agent:expr, $prompt:expr, $history:expr, $chunk_tx:expr, $cancel:expr) => {{
        let mut stream = $agent.stream_prompt($prompt).with_history($history).await;

        let id = MessageId::generate();
        if $chunk_tx.send(Chunk::Start { id: id.clone() }).is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = $cancel.cancelled() => {
                    // Silent stop: neither finish nor error. Dropping the
                    // stream stops provider IO promptly.
                    tracing::debug!(message_id = %id, "generation cancelled mid-iteration");
                    return;
                }
                item = stream.next() => match item {
                    Some(Ok(MultiTurnStreamItem::StreamAssistantItem(content))) => match content {
                        StreamedAssistantContent::Text(text) => {
                            if text.text.is_empty() {
                                continue;
                            }
                            let delta = Chunk::TextDelta { id: id.clone(), delta: text.text };
                            if $chunk_tx.send(delta).is_err() {
                                return;
                            }
                        }
                        _ => {}
                    },
                    Some(Ok(_)) => {}
                    Some(Err(source)) => {
                        tracing::warn!(message_id = %id, error = %source, "provider stream failed");
                        let _ = $chunk_tx.send(Chunk::Error { message: source.to_string() });
                        return;
                    }
                    None => {
                        let _ = $chunk_tx.send(Chunk::Finish { id });
                        return;
                    }
                }
            }
        }
    }};
}

async fn run_stream_worker(
    client: AgentClient,
    request: StreamRequest,
    chunk_tx: mpsc::UnboundedSender<Chunk>,
    cancel: CancellationToken,
) {
    // A token signaled before the first event is pulled means the session
    // never existed from the consumer's point of view: zero chunks, no start.
    if cancel.is_cancelled() {
        tracing::debug!("generation cancelled before start");
        return;
    }

    let mut history: Vec<RigMessage> = request.messages.iter().filter_map(to_rig_message).collect();
    let Some(prompt) = history.pop() else {
        let _ = chunk_tx.send(Chunk::Error {
            message: "no user or assistant messages remain after normalization".to_string(),
        });
        return;
    };

    tracing::debug!(
        provider = %client.kind(),
        history_len = history.len(),
        "opening provider stream"
    );

    match &client {
        AgentClient::OpenAi(agent) => {
            pump_agent_stream!(agent, prompt, history, chunk_tx, cancel)
        }
        AgentClient::Anthropic(agent) => {
            pump_agent_stream!(agent, prompt, history, chunk_tx, cancel)
        }
        AgentClient::Google(agent) => {
            pump_agent_stream!(agent, prompt, history, chunk_tx, cancel)
        }
        AgentClient::Ollama(agent) => {
            pump_agent_stream!(agent, prompt, history, chunk_tx, cancel)
        }
    }
}
