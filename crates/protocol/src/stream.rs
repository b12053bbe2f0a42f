use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// One semantic unit of an in-progress assistant reply.
///
/// Chunks are scoped to exactly one assistant message via `id`. For a given
/// id they arrive in send order, and `Finish`/`Error` is terminal: nothing
/// follows it within the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Chunk {
    /// Announces a freshly assigned assistant message id before any text.
    Start { id: MessageId },
    /// Incremental text appended to the announced message. Never empty.
    TextDelta { id: MessageId, delta: String },
    /// The message completed normally.
    Finish { id: MessageId },
    /// The stream failed; carries a human-readable description.
    Error { message: String },
}

impl Chunk {
    /// Returns true for the two terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}

/// The single frame the UI side may send back on a session's control
/// channel to request cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub abort: bool,
}

impl ControlMessage {
    /// The abort request frame, `{"abort":true}` on the wire.
    pub const ABORT: Self = Self { abort: true };
}
