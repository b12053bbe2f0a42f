use futures::future::BoxFuture;
use snafu::Snafu;

use crate::conversation::Conversation;

/// Persistence failure reported by the conversation store collaborator.
#[derive(Debug, Snafu)]
#[snafu(display("failed to persist conversation: {message}"))]
pub struct StoreError {
    pub message: String,
}

/// The conversation persistence collaborator.
///
/// The core hands over the finished message list after every completed turn
/// and never interprets the on-disk format. Save failures are logged by the
/// caller, never surfaced as turn failures.
pub trait ConversationStore: Send + Sync {
    fn save<'a>(&'a self, conversation: &'a Conversation) -> BoxFuture<'a, Result<(), StoreError>>;
}
