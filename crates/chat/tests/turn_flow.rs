//! End-to-end turn lifecycle tests against a scripted generation backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use plume_bridge::{DISCONNECT_MESSAGE, ServiceError, ServiceResult, UiEndpoint, open_session};
use plume_chat::{
    ChatController, ChatError, ChatRegistry, ChatStatus, Conversation, ConversationStore,
    StoreError, TurnEvent, TurnSource,
};
use plume_llm::{ConfigError, ProviderKind};
use plume_protocol::{Chunk, ConversationId, Message, MessageId, Part, Role};

/// Generation stand-in: each `open_turn` pops the next chunk script, plays
/// it onto a fresh session, and closes the channel. A script without a
/// terminal chunk models an abrupt backend death.
struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<Chunk>>>,
    histories: Mutex<Vec<Vec<Message>>>,
    title_calls: AtomicUsize,
    title_fails: bool,
}

impl ScriptedSource {
    fn new(scripts: Vec<Vec<Chunk>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            histories: Mutex::new(Vec::new()),
            title_calls: AtomicUsize::new(0),
            title_fails: false,
        })
    }

    fn with_failing_titles(scripts: Vec<Vec<Chunk>>) -> Arc<Self> {
        let mut source = Self::new(scripts);
        Arc::get_mut(&mut source).expect("fresh arc").title_fails = true;
        source
    }

    fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().expect("histories lock").clone()
    }
}

impl TurnSource for ScriptedSource {
    fn open_turn<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> BoxFuture<'a, ServiceResult<UiEndpoint>> {
        Box::pin(async move {
            self.histories
                .lock()
                .expect("histories lock")
                .push(messages.to_vec());

            let script = self
                .scripts
                .lock()
                .expect("scripts lock")
                .pop_front()
                .expect("a script for every opened turn");

            let (backend, ui) = open_session();
            for chunk in script {
                backend.send(chunk);
            }
            Ok(ui)
        })
    }

    fn generate_title<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, ServiceResult<String>> {
        Box::pin(async move {
            self.title_calls.fetch_add(1, Ordering::SeqCst);
            if self.title_fails {
                Err(ServiceError::Configuration {
                    source: ConfigError::MissingApiKey {
                        kind: ProviderKind::OpenAi,
                    },
                })
            } else {
                Ok("Rust Question".to_string())
            }
        })
    }
}

#[derive(Default)]
struct RecordingStore {
    saves: Mutex<Vec<Conversation>>,
}

impl RecordingStore {
    fn saves(&self) -> Vec<Conversation> {
        self.saves.lock().expect("saves lock").clone()
    }
}

impl ConversationStore for RecordingStore {
    fn save<'a>(&'a self, conversation: &'a Conversation) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.saves
                .lock()
                .expect("saves lock")
                .push(conversation.clone());
            Ok(())
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(id: &str) -> Chunk {
    Chunk::Start {
        id: MessageId::new(id),
    }
}

fn delta(id: &str, text: &str) -> Chunk {
    Chunk::TextDelta {
        id: MessageId::new(id),
        delta: text.to_string(),
    }
}

fn finish(id: &str) -> Chunk {
    Chunk::Finish {
        id: MessageId::new(id),
    }
}

fn fresh_controller(
    source: Arc<ScriptedSource>,
) -> (ChatController, Arc<RecordingStore>) {
    init_tracing();
    let store = Arc::new(RecordingStore::default());
    let conversation = Conversation::new(ConversationId::generate(), "New Chat");
    let controller = ChatController::new(conversation, source, store.clone());
    (controller, store)
}

fn loaded_controller(
    messages: Vec<Message>,
    source: Arc<ScriptedSource>,
) -> (ChatController, Arc<RecordingStore>) {
    init_tracing();
    let store = Arc::new(RecordingStore::default());
    let conversation =
        Conversation::with_messages(ConversationId::generate(), "Loaded", messages);
    let controller = ChatController::new(conversation, source, store.clone());
    (controller, store)
}

fn text_message(id: &str, role: Role, text: &str) -> Message {
    Message::new(MessageId::new(id), role, vec![Part::text(text)])
}

#[tokio::test]
async fn send_streams_deltas_into_one_assistant_message() {
    let source = ScriptedSource::new(vec![vec![
        start("a1"),
        delta("a1", "Hi"),
        delta("a1", " there"),
        finish("a1"),
    ]]);
    let (mut controller, store) = fresh_controller(source.clone());

    controller.send("Hello").await.expect("send accepted");
    assert_eq!(controller.status(), ChatStatus::Sending);

    let last = controller.run_to_completion().await;
    assert!(matches!(last, Some(TurnEvent::Finished { .. })));

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text(), "Hello");
    assert_eq!(messages[1].id, MessageId::new("a1"));
    assert_eq!(messages[1].text(), "Hi there");

    assert_eq!(controller.status(), ChatStatus::Idle);
    assert_eq!(controller.last_error(), None);
    assert_eq!(controller.title(), "Rust Question");

    // One save, of the finished state.
    let saves = store.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].messages[1].text(), "Hi there");

    // The opened turn saw the full history including the new user message.
    let histories = source.histories();
    assert_eq!(histories.len(), 1);
    assert_eq!(histories[0].last().expect("user message").text(), "Hello");
}

#[tokio::test]
async fn stop_keeps_partial_text_and_persists_it() {
    let source = ScriptedSource::new(vec![vec![
        start("a1"),
        delta("a1", "Expl"),
        delta("a1", "ain X"),
        finish("a1"),
    ]]);
    let (mut controller, store) = fresh_controller(source);

    controller.send("Explain X").await.expect("send accepted");
    assert!(matches!(
        controller.step().await,
        Some(TurnEvent::Started { .. })
    ));
    assert!(matches!(
        controller.step().await,
        Some(TurnEvent::Delta { .. })
    ));
    assert_eq!(controller.status(), ChatStatus::Receiving);

    controller.stop().await.expect("stop accepted");

    assert_eq!(controller.status(), ChatStatus::Idle);
    assert_eq!(controller.last_error(), None);
    assert_eq!(controller.messages()[1].text(), "Expl");
    assert_eq!(store.saves().len(), 1);
    assert_eq!(store.saves()[0].messages[1].text(), "Expl");

    // The turn is gone; stepping again yields nothing.
    assert_eq!(controller.step().await, None);
    assert!(matches!(
        controller.stop().await,
        Err(ChatError::NotReceiving)
    ));
}

#[tokio::test]
async fn abrupt_close_surfaces_one_error_and_skips_the_save() {
    let source = ScriptedSource::new(vec![vec![start("a1"), delta("a1", "Hi")]]);
    let (mut controller, store) = fresh_controller(source);

    controller.send("Hello").await.expect("send accepted");
    let last = controller.run_to_completion().await;

    assert!(matches!(
        last,
        Some(TurnEvent::Failed { message }) if message == DISCONNECT_MESSAGE
    ));
    assert_eq!(controller.last_error(), Some(DISCONNECT_MESSAGE));
    assert_eq!(controller.status(), ChatStatus::Idle);

    // Partial text stays visible, but the failed turn is not persisted.
    assert_eq!(controller.messages()[1].text(), "Hi");
    assert!(store.saves().is_empty());
}

#[tokio::test]
async fn submit_edit_truncates_downstream_and_regenerates() {
    let source = ScriptedSource::new(vec![vec![
        start("a3"),
        delta("a3", "Better answer"),
        finish("a3"),
    ]]);
    let (mut controller, store) = loaded_controller(
        vec![
            text_message("u1", Role::User, "First question"),
            text_message("a1", Role::Assistant, "First answer"),
            text_message("u2", Role::User, "Second question"),
            text_message("a2", Role::Assistant, "Second answer"),
        ],
        source.clone(),
    );

    controller
        .begin_edit(&MessageId::new("u2"))
        .expect("edit accepted");
    assert_eq!(controller.ephemeral_ids(), vec![MessageId::new("a2")]);
    assert!(controller.is_ephemeral(&MessageId::new("a2")));
    assert!(!controller.is_ephemeral(&MessageId::new("a1")));

    controller
        .submit_edit("Second question, clarified")
        .await
        .expect("submit accepted");
    let last = controller.run_to_completion().await;
    assert!(matches!(last, Some(TurnEvent::Finished { .. })));

    let messages = controller.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].id, MessageId::new("u1"));
    assert_eq!(messages[1].id, MessageId::new("a1"));
    // Edited in place: same id, new text.
    assert_eq!(messages[2].id, MessageId::new("u2"));
    assert_eq!(messages[2].text(), "Second question, clarified");
    // Regenerated reply carries a fresh id.
    assert_eq!(messages[3].id, MessageId::new("a3"));
    assert_eq!(messages[3].text(), "Better answer");

    assert_eq!(controller.editing_message_id(), None);
    assert_eq!(store.saves().len(), 1);

    // The regeneration request ends at the edited message.
    let histories = source.histories();
    assert_eq!(histories[0].len(), 3);
    assert_eq!(histories[0][2].text(), "Second question, clarified");
}

#[tokio::test]
async fn submit_edit_without_downstream_reply_is_a_pure_rewrite() {
    let source = ScriptedSource::new(Vec::new());
    let (mut controller, store) = loaded_controller(
        vec![
            text_message("u1", Role::User, "First question"),
            text_message("a1", Role::Assistant, "First answer"),
            text_message("u2", Role::User, "Unanswered"),
        ],
        source.clone(),
    );

    controller
        .begin_edit(&MessageId::new("u2"))
        .expect("edit accepted");
    controller
        .submit_edit("Unanswered, reworded")
        .await
        .expect("submit accepted");

    assert_eq!(controller.status(), ChatStatus::Idle);
    assert_eq!(controller.messages().len(), 3);
    assert_eq!(controller.messages()[2].id, MessageId::new("u2"));
    assert_eq!(controller.messages()[2].text(), "Unanswered, reworded");
    assert!(source.histories().is_empty());
    assert_eq!(store.saves().len(), 1);
}

#[tokio::test]
async fn edit_rules_are_enforced() {
    let source = ScriptedSource::new(vec![vec![start("a2"), finish("a2")]]);
    let (mut controller, _store) = loaded_controller(
        vec![
            text_message("u1", Role::User, "Question"),
            text_message("a1", Role::Assistant, "Answer"),
        ],
        source,
    );

    assert!(matches!(
        controller.begin_edit(&MessageId::new("a1")),
        Err(ChatError::NotAUserMessage { .. })
    ));
    assert!(matches!(
        controller.begin_edit(&MessageId::new("nope")),
        Err(ChatError::UnknownMessage { .. })
    ));
    assert!(matches!(
        controller.submit_edit("text").await,
        Err(ChatError::NoEditInProgress)
    ));

    controller
        .begin_edit(&MessageId::new("u1"))
        .expect("edit accepted");
    assert!(matches!(
        controller.send("more").await,
        Err(ChatError::EditInProgress)
    ));
    assert!(matches!(
        controller.begin_edit(&MessageId::new("u1")),
        Err(ChatError::EditInProgress)
    ));

    // Cancel restores normal sending without touching the message.
    controller.cancel_edit();
    assert_eq!(controller.messages()[0].text(), "Question");
    assert!(controller.ephemeral_ids().is_empty());
    controller.send("more").await.expect("send accepted");
}

#[tokio::test]
async fn send_is_rejected_while_a_turn_is_in_flight() {
    let source = ScriptedSource::new(vec![vec![start("a1"), finish("a1")]]);
    let (mut controller, _store) = fresh_controller(source);

    controller.send("Hello").await.expect("send accepted");
    assert!(matches!(
        controller.send("again").await,
        Err(ChatError::GenerationInProgress)
    ));

    assert!(matches!(
        controller.step().await,
        Some(TurnEvent::Started { .. })
    ));
    assert!(matches!(
        controller.send("again").await,
        Err(ChatError::GenerationInProgress)
    ));
}

#[tokio::test]
async fn title_is_generated_once_and_failure_never_blocks_the_send() {
    let source = ScriptedSource::with_failing_titles(vec![
        vec![start("a1"), finish("a1")],
        vec![start("a2"), finish("a2")],
    ]);
    let (mut controller, _store) = fresh_controller(source.clone());

    controller.send("Hello").await.expect("send accepted");
    controller.run_to_completion().await;
    assert_eq!(controller.title(), "New Chat");

    controller.send("More").await.expect("send accepted");
    controller.run_to_completion().await;

    assert_eq!(source.title_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registry_keys_controllers_by_conversation_id() {
    let source = ScriptedSource::new(Vec::new());
    let store = Arc::new(RecordingStore::default());
    let mut registry = ChatRegistry::new(source, store);

    let first = registry.open();
    let second = registry.open();
    assert_ne!(first, second);
    assert_eq!(registry.len(), 2);

    registry
        .get_mut(&first)
        .expect("open conversation")
        .cancel_edit();
    assert!(registry.get(&ConversationId::new("missing")).is_none());

    let closed = registry.close(&first).expect("closes");
    assert_eq!(closed.id, first);
    assert_eq!(registry.len(), 1);
    assert!(registry.close(&first).is_none());
}
