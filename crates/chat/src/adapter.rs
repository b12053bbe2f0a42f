use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use plume_bridge::{AbortHandle, UiEndpoint};
use plume_protocol::Chunk;

/// Pull-based view of one bridged session, plus its cancel function.
///
/// Every bridged chunk is forwarded as one item; a terminal chunk (`finish`
/// or `error`, including the bridge-synthesized disconnect error) is the
/// last item. Once the shared finalized flag is set, whether by a terminal
/// item or by `CancelHandle::cancel`, the stream yields `None` and any chunk
/// in flight is dropped rather than re-opening state.
pub struct ChatStream {
    endpoint: UiEndpoint,
    finalized: Arc<AtomicBool>,
}

/// Cancel function handed to the caller of `adapt`.
#[derive(Clone)]
pub struct CancelHandle {
    abort: AbortHandle,
    finalized: Arc<AtomicBool>,
}

/// Wraps a session endpoint into the chat framework's transport shape.
pub fn adapt(endpoint: UiEndpoint) -> (ChatStream, CancelHandle) {
    let finalized = Arc::new(AtomicBool::new(false));
    let cancel = CancelHandle {
        abort: endpoint.abort_handle(),
        finalized: finalized.clone(),
    };

    (ChatStream { endpoint, finalized }, cancel)
}

impl ChatStream {
    /// Pulls the next chunk; `None` once finalized.
    pub async fn next(&mut self) -> Option<Chunk> {
        if self.finalized.load(Ordering::SeqCst) {
            return None;
        }

        let chunk = self.endpoint.recv().await?;

        // Cancellation is cooperative, so a bounded number of chunks may
        // still arrive after cancel(); they must not reach the consumer.
        if self.finalized.load(Ordering::SeqCst) {
            return None;
        }

        if chunk.is_terminal() {
            self.finalized.store(true, Ordering::SeqCst);
        }
        Some(chunk)
    }
}

impl CancelHandle {
    /// Sends the abort frame and closes the local stream.
    ///
    /// A second call, or a call after the stream already completed, is a
    /// no-op.
    pub fn cancel(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("stream cancelled by consumer");
        self.abort.abort();
    }
}
