use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use plume_protocol::{Chunk, ControlMessage};

/// Message shown when the backend goes away without a terminal frame.
pub const DISCONNECT_MESSAGE: &str = "stream closed unexpectedly";

/// Lifecycle of one streaming session. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Pending,
    Streaming,
    Done,
    Errored,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored | Self::Aborted)
    }

    /// Moves to `next` unless already terminal.
    pub fn advance(self, next: Self) -> Self {
        if self.is_terminal() { self } else { next }
    }
}

/// Backend side of one session: writes chunks, reads control frames.
pub struct BackendEndpoint {
    pub(crate) frames: mpsc::UnboundedSender<Chunk>,
    pub(crate) control: mpsc::UnboundedReceiver<ControlMessage>,
}

impl BackendEndpoint {
    /// Writes one frame; false once the UI side is gone.
    pub fn send(&self, chunk: Chunk) -> bool {
        self.frames.send(chunk).is_ok()
    }
}

/// UI side of one session: reads frames, may request abort once.
///
/// If the data channel closes before any terminal frame was seen (backend
/// crash, dropped session), `recv` synthesizes a single terminal error so
/// consumers are never left waiting. A session the UI itself aborted closes
/// silently instead.
pub struct UiEndpoint {
    frames: mpsc::UnboundedReceiver<Chunk>,
    abort: AbortHandle,
    saw_terminal: bool,
    synthesized: bool,
}

/// Cloneable cancellation side of a session. The first `abort` call sends
/// the control frame; every later call is a no-op.
#[derive(Clone)]
pub struct AbortHandle {
    control: mpsc::UnboundedSender<ControlMessage>,
    sent: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Sends the abort frame once. Returns true on the call that sent it.
    pub fn abort(&self) -> bool {
        if self.sent.swap(true, Ordering::SeqCst) {
            return false;
        }
        // The backend may already be gone; a dead control channel is fine.
        let _ = self.control.send(ControlMessage::ABORT);
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }
}

/// Opens the dedicated channel pair for one send operation.
pub fn open_session() -> (BackendEndpoint, UiEndpoint) {
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    (
        BackendEndpoint {
            frames: frame_tx,
            control: control_rx,
        },
        UiEndpoint {
            frames: frame_rx,
            abort: AbortHandle {
                control: control_tx,
                sent: Arc::new(AtomicBool::new(false)),
            },
            saw_terminal: false,
            synthesized: false,
        },
    )
}

impl UiEndpoint {
    /// Reads the next frame, or `None` once the session is over.
    pub async fn recv(&mut self) -> Option<Chunk> {
        match self.frames.recv().await {
            Some(chunk) => {
                if chunk.is_terminal() {
                    self.saw_terminal = true;
                }
                Some(chunk)
            }
            None => {
                if self.saw_terminal || self.abort.is_aborted() || self.synthesized {
                    return None;
                }
                tracing::warn!("session channel closed with no terminal frame");
                self.synthesized = true;
                Some(Chunk::Error {
                    message: DISCONNECT_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Requests cancellation. Safe to call more than once; only the first
    /// call sends a control frame.
    pub fn abort(&mut self) {
        self.abort.abort();
    }

    /// Detached cancellation handle for callers that hand the endpoint off.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}
