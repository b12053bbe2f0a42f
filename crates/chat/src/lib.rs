#![deny(unsafe_code)]

//! Conversation orchestration on top of the streaming transport.
//!
//! A [`ChatController`] owns one conversation's state machine: it appends
//! user messages, folds streamed reply chunks into the message list, handles
//! stop and edit-with-regenerate, and persists the conversation after every
//! completed turn. [`ChatRegistry`] keys live controllers by conversation id.

mod adapter;
mod conversation;
mod error;
mod registry;
mod store;

pub use adapter::{CancelHandle, ChatStream, adapt};
pub use conversation::{ChatController, ChatStatus, Conversation, TurnEvent, TurnSource};
pub use error::{ChatError, ChatResult};
pub use registry::ChatRegistry;
pub use store::{ConversationStore, StoreError};
