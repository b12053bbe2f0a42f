#![deny(unsafe_code)]

//! Shared data model and wire frames for the streaming inference core.
//!
//! Everything here is JSON-serializable: the conversation message model and
//! the per-session stream frames that cross the backend/UI boundary.

mod message;
mod stream;

pub use message::{ConversationId, Message, MessageId, Part, Role};
pub use stream::{Chunk, ControlMessage};
