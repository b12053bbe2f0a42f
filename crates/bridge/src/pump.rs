use plume_llm::ChunkStreamHandle;
use plume_protocol::Chunk;

use crate::session::{BackendEndpoint, SessionState};

/// Drives one generation onto the wire.
///
/// Spawns the generator worker, then forwards each chunk to the data channel
/// as it arrives. An abort control frame cancels the generator's token and
/// stops all writing; a dropped UI endpoint counts as an abort. The data
/// channel closes when this function returns, whether the generator finished,
/// failed, or was cancelled.
pub async fn serve(handle: ChunkStreamHandle, mut endpoint: BackendEndpoint) -> SessionState {
    let ChunkStreamHandle {
        mut stream,
        cancel,
        worker,
    } = handle;

    let worker_task = tokio::spawn(worker);
    let mut state = SessionState::Pending;

    loop {
        tokio::select! {
            control = endpoint.control.recv() => {
                match control {
                    Some(frame) if frame.abort => {
                        tracing::debug!("abort received on control channel");
                    }
                    Some(_) => continue,
                    None => {
                        tracing::debug!("ui endpoint dropped; treating as abort");
                    }
                }
                cancel.cancel();
                state = state.advance(SessionState::Aborted);
                break;
            }
            chunk = stream.recv() => match chunk {
                Some(chunk) => {
                    state = state.advance(match &chunk {
                        Chunk::Start { .. } => SessionState::Streaming,
                        Chunk::TextDelta { .. } => state,
                        Chunk::Finish { .. } => SessionState::Done,
                        Chunk::Error { .. } => SessionState::Errored,
                    });

                    let terminal = chunk.is_terminal();
                    if !endpoint.send(chunk) {
                        // Receiver gone mid-write: same as a dropped endpoint.
                        cancel.cancel();
                        state = state.advance(SessionState::Aborted);
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                None => break,
            }
        }
    }

    // Exhaust the generator without writing; a cancelled worker may still
    // have a bounded number of chunks in flight.
    while stream.recv().await.is_some() {}
    let _ = worker_task.await;

    tracing::debug!(?state, "session pump finished");
    state
}
