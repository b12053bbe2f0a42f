use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Creates a typed conversation identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Creates a fresh random conversation identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier for one message.
///
/// Unique within a conversation's message list; assistant ids are assigned by
/// the streaming generator and announced via the `start` chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates a typed message identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Creates a fresh random message identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One ordered piece of a message body.
///
/// Only `Text` is interpreted by this core. `Reasoning` is carried so the
/// normalizer can relocate it; every other shape round-trips through `Other`
/// untouched so newer part kinds survive a save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    #[serde(untagged)]
    Other(Value),
}

impl Part {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the rendered text of this part, if it has any.
    pub fn rendered_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Reasoning { .. } | Self::Other(_) => None,
        }
    }
}

/// Core message model: an id, a speaker, and an ordered part sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    /// Creates a message with explicit parts.
    pub fn new(id: MessageId, role: Role, parts: Vec<Part>) -> Self {
        Self { id, role, parts }
    }

    /// Creates a user message holding one text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageId::generate(), Role::User, vec![Part::text(text)])
    }

    /// Creates a system message holding one text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageId::generate(), Role::System, vec![Part::text(text)])
    }

    /// Creates an empty assistant message ready to receive streamed deltas.
    ///
    /// The id comes from the `start` chunk so both ends agree on it.
    pub fn assistant_shell(id: MessageId) -> Self {
        Self::new(id, Role::Assistant, Vec::new())
    }

    /// Returns the concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::rendered_text)
            .collect::<Vec<_>>()
            .concat()
    }

    /// Appends a streamed delta to the trailing text part, creating one if
    /// the message has none yet.
    pub fn append_text(&mut self, delta: &str) {
        if let Some(Part::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(Part::text(delta));
        }
    }

    /// Replaces the message body with a single text part, keeping the id.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.parts = vec![Part::text(text)];
    }

    /// Returns true when the rendered text is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}
