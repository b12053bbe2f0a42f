use std::collections::HashMap;
use std::sync::Arc;

use plume_protocol::ConversationId;

use crate::conversation::{ChatController, Conversation, TurnSource};
use crate::store::ConversationStore;

const DEFAULT_TITLE: &str = "New Chat";

/// Owns every live conversation controller, keyed by conversation id.
///
/// One controller exists per open conversation; different conversations may
/// stream concurrently because each controller drives its own session.
/// Closing a conversation drops its controller, which aborts any in-flight
/// generation through the transport's dropped-endpoint path.
pub struct ChatRegistry {
    source: Arc<dyn TurnSource>,
    store: Arc<dyn ConversationStore>,
    chats: HashMap<ConversationId, ChatController>,
}

impl ChatRegistry {
    pub fn new(source: Arc<dyn TurnSource>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            source,
            store,
            chats: HashMap::new(),
        }
    }

    /// Creates a fresh empty conversation and returns its id.
    pub fn open(&mut self) -> ConversationId {
        let id = ConversationId::generate();
        let conversation = Conversation::new(id.clone(), DEFAULT_TITLE);
        self.adopt(conversation);
        id
    }

    /// Registers a conversation loaded from persistence.
    ///
    /// An existing controller under the same id is replaced.
    pub fn adopt(&mut self, conversation: Conversation) -> ConversationId {
        let id = conversation.id.clone();
        let controller =
            ChatController::new(conversation, self.source.clone(), self.store.clone());
        self.chats.insert(id.clone(), controller);
        id
    }

    pub fn get(&self, id: &ConversationId) -> Option<&ChatController> {
        self.chats.get(id)
    }

    pub fn get_mut(&mut self, id: &ConversationId) -> Option<&mut ChatController> {
        self.chats.get_mut(id)
    }

    /// Drops the conversation's controller, returning its final state.
    pub fn close(&mut self, id: &ConversationId) -> Option<Conversation> {
        self.chats
            .remove(id)
            .map(|controller| controller.conversation().clone())
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConversationId> {
        self.chats.keys()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
