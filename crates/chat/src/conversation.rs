use std::sync::Arc;

use futures::future::BoxFuture;
use snafu::{OptionExt, ResultExt, ensure};

use plume_bridge::{InferenceService, ServiceResult, UiEndpoint};
use plume_protocol::{Chunk, ConversationId, Message, MessageId, Role};

use crate::adapter::{CancelHandle, ChatStream, adapt};
use crate::error::{
    BackendSnafu, ChatResult, EditInProgressSnafu, GenerationInProgressSnafu, NoEditInProgressSnafu,
    NotAUserMessageSnafu, NotReceivingSnafu, UnknownMessageSnafu,
};
use crate::store::ConversationStore;

/// One conversation's replicated state: a title and an ordered message list.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(id: ConversationId, title: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id,
            title: title.into(),
            messages,
        }
    }
}

/// Where the controller is in its turn lifecycle.
///
/// `Sending` covers the window between submitting a turn and the `start`
/// chunk arriving; `Receiving` lasts until a terminal chunk or a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Sending,
    Receiving,
}

/// What one `step` observed, for callers that re-render incrementally.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// The assistant message was created; its id came off the wire.
    Started { id: MessageId },
    /// Text was appended to the assistant message.
    Delta { id: MessageId },
    /// The turn completed and the conversation was persisted.
    Finished { id: MessageId },
    /// The turn failed; partial text is kept, nothing was persisted.
    Failed { message: String },
    /// The stream ended without a further chunk.
    Closed,
}

/// The generation collaborator behind a conversation.
///
/// `InferenceService` is the production implementation; tests substitute a
/// scripted one.
pub trait TurnSource: Send + Sync {
    fn open_turn<'a>(&'a self, messages: &'a [Message])
    -> BoxFuture<'a, ServiceResult<UiEndpoint>>;
    fn generate_title<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, ServiceResult<String>>;
}

impl TurnSource for InferenceService {
    fn open_turn<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> BoxFuture<'a, ServiceResult<UiEndpoint>> {
        Box::pin(self.send(messages))
    }

    fn generate_title<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, ServiceResult<String>> {
        Box::pin(InferenceService::generate_title(self, prompt))
    }
}

struct ActiveTurn {
    stream: ChatStream,
    cancel: CancelHandle,
}

/// Drives one conversation through sends, streamed replies, edits, and stops.
///
/// The controller owns the conversation state and is the only writer to it.
/// It persists the conversation after every completed or stopped turn; a
/// failed turn keeps its partial text in memory but is not persisted.
pub struct ChatController {
    conversation: Conversation,
    status: ChatStatus,
    editing_message_id: Option<MessageId>,
    titled: bool,
    last_error: Option<String>,
    active: Option<ActiveTurn>,
    source: Arc<dyn TurnSource>,
    store: Arc<dyn ConversationStore>,
}

impl ChatController {
    pub fn new(
        conversation: Conversation,
        source: Arc<dyn TurnSource>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        // A loaded conversation that already has user messages keeps its
        // title; only a genuinely fresh one gets titled on first send.
        let titled = conversation
            .messages
            .iter()
            .any(|message| message.role == Role::User);

        Self {
            conversation,
            status: ChatStatus::Idle,
            editing_message_id: None,
            titled,
            last_error: None,
            active: None,
            source,
            store,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn title(&self) -> &str {
        &self.conversation.title
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn editing_message_id(&self) -> Option<&MessageId> {
        self.editing_message_id.as_ref()
    }

    /// Appends a user message and starts a streamed reply.
    ///
    /// Rejected while an edit overlay is open or while a turn is in flight.
    /// The first send of a fresh conversation also titles it; a title failure
    /// is logged and never blocks the send.
    pub async fn send(&mut self, text: impl Into<String>) -> ChatResult<()> {
        ensure!(self.editing_message_id.is_none(), EditInProgressSnafu);
        ensure!(self.status == ChatStatus::Idle, GenerationInProgressSnafu);

        let text = text.into();
        self.last_error = None;
        self.conversation.messages.push(Message::user(text.clone()));

        if !self.titled {
            self.titled = true;
            self.generate_title(&text).await;
        }

        self.status = ChatStatus::Sending;
        self.open_turn().await
    }

    /// Marks a user message as under edit. Downstream messages become
    /// ephemeral in the UI but are not touched until the edit is submitted.
    pub fn begin_edit(&mut self, id: &MessageId) -> ChatResult<()> {
        ensure!(self.editing_message_id.is_none(), EditInProgressSnafu);

        let message = self
            .conversation
            .messages
            .iter()
            .find(|message| &message.id == id)
            .context(UnknownMessageSnafu { id: id.clone() })?;
        ensure!(
            message.role == Role::User,
            NotAUserMessageSnafu { id: id.clone() }
        );

        self.editing_message_id = Some(id.clone());
        Ok(())
    }

    /// Closes the edit overlay without changing any message.
    pub fn cancel_edit(&mut self) {
        self.editing_message_id = None;
    }

    /// Replaces the edited message's text in place and regenerates from it.
    ///
    /// The edited message keeps its id. Everything after the first assistant
    /// reply that follows it is dropped, and a fresh reply is streamed in
    /// against the truncated history. If no assistant reply follows, the edit
    /// is a pure rewrite and no generation starts.
    pub async fn submit_edit(&mut self, new_text: impl Into<String>) -> ChatResult<()> {
        let editing = self
            .editing_message_id
            .clone()
            .context(NoEditInProgressSnafu)?;
        ensure!(self.status == ChatStatus::Idle, GenerationInProgressSnafu);

        let index = self
            .conversation
            .messages
            .iter()
            .position(|message| message.id == editing)
            .context(UnknownMessageSnafu { id: editing.clone() })?;

        self.conversation.messages[index].replace_text(new_text);
        self.editing_message_id = None;
        self.last_error = None;

        let regenerate_from = self.conversation.messages[index + 1..]
            .iter()
            .position(|message| message.role == Role::Assistant)
            .map(|offset| index + 1 + offset);

        match regenerate_from {
            Some(assistant_index) => {
                self.conversation.messages.truncate(assistant_index);
                self.status = ChatStatus::Sending;
                self.open_turn().await
            }
            None => {
                self.save().await;
                Ok(())
            }
        }
    }

    /// Message ids rendered as ephemeral while the current edit is open:
    /// everything strictly after the message under edit.
    pub fn ephemeral_ids(&self) -> Vec<MessageId> {
        let Some(editing) = &self.editing_message_id else {
            return Vec::new();
        };
        let Some(index) = self
            .conversation
            .messages
            .iter()
            .position(|message| &message.id == editing)
        else {
            return Vec::new();
        };

        self.conversation.messages[index + 1..]
            .iter()
            .map(|message| message.id.clone())
            .collect()
    }

    pub fn is_ephemeral(&self, id: &MessageId) -> bool {
        self.ephemeral_ids().iter().any(|candidate| candidate == id)
    }

    /// Cancels the in-flight reply, keeping whatever text already arrived.
    ///
    /// The stopped turn counts as complete: the conversation is persisted
    /// and no error is recorded.
    pub async fn stop(&mut self) -> ChatResult<()> {
        ensure!(self.status == ChatStatus::Receiving, NotReceivingSnafu);
        let turn = self.active.take().context(NotReceivingSnafu)?;

        turn.cancel.cancel();
        self.status = ChatStatus::Idle;
        self.save().await;
        Ok(())
    }

    /// Pulls one chunk from the active turn and folds it into the
    /// conversation. Returns `None` when no turn is active.
    pub async fn step(&mut self) -> Option<TurnEvent> {
        let chunk = match self.active.as_mut() {
            Some(turn) => turn.stream.next().await,
            None => return None,
        };

        let Some(chunk) = chunk else {
            self.active = None;
            self.status = ChatStatus::Idle;
            return Some(TurnEvent::Closed);
        };

        match chunk {
            Chunk::Start { id } => {
                self.conversation
                    .messages
                    .push(Message::assistant_shell(id.clone()));
                self.status = ChatStatus::Receiving;
                Some(TurnEvent::Started { id })
            }
            Chunk::TextDelta { id, delta } => {
                if let Some(message) = self
                    .conversation
                    .messages
                    .iter_mut()
                    .rfind(|message| message.id == id)
                {
                    message.append_text(&delta);
                } else {
                    tracing::warn!(%id, "delta for unknown message; dropping");
                }
                Some(TurnEvent::Delta { id })
            }
            Chunk::Finish { id } => {
                self.active = None;
                self.status = ChatStatus::Idle;
                self.save().await;
                Some(TurnEvent::Finished { id })
            }
            Chunk::Error { message } => {
                tracing::warn!(error = %message, "generation failed");
                self.active = None;
                self.status = ChatStatus::Idle;
                self.last_error = Some(message.clone());
                Some(TurnEvent::Failed { message })
            }
        }
    }

    /// Drains the active turn to its end, returning the last event seen.
    pub async fn run_to_completion(&mut self) -> Option<TurnEvent> {
        let mut last = None;
        while let Some(event) = self.step().await {
            let terminal = matches!(
                event,
                TurnEvent::Finished { .. } | TurnEvent::Failed { .. } | TurnEvent::Closed
            );
            last = Some(event);
            if terminal {
                break;
            }
        }
        last
    }

    async fn open_turn(&mut self) -> ChatResult<()> {
        match self.source.open_turn(&self.conversation.messages).await {
            Ok(endpoint) => {
                let (stream, cancel) = adapt(endpoint);
                self.active = Some(ActiveTurn { stream, cancel });
                Ok(())
            }
            Err(source) => {
                self.status = ChatStatus::Idle;
                Err(source).context(BackendSnafu)
            }
        }
    }

    async fn generate_title(&mut self, first_text: &str) {
        let system_context = self
            .conversation
            .messages
            .iter()
            .find(|message| message.role == Role::System)
            .map(Message::text);

        let mut prompt = String::from("Generate a concise 3-8 word title for this conversation.\n");
        if let Some(system_context) = system_context {
            prompt.push_str(&format!("System context: {system_context}\n"));
        }
        prompt.push_str(&format!(
            "First user message: {first_text}\n\nRespond with ONLY the title, nothing else."
        ));

        match self.source.generate_title(&prompt).await {
            Ok(title) => self.conversation.title = title,
            Err(error) => {
                tracing::warn!(error = %error, "title generation failed; keeping default title");
            }
        }
    }

    async fn save(&self) {
        if let Err(error) = self.store.save(&self.conversation).await {
            tracing::warn!(
                error = %error,
                conversation_id = %self.conversation.id,
                "conversation save failed"
            );
        }
    }
}
